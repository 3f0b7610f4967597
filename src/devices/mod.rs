
// Only LeCroy scopes are supported.  Their command set differs enough between manufacturers that each one
// gets its own module rather than a shared abstraction.

pub mod lecroy;
