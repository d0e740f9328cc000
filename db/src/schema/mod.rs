pub use self::auto::*;

// `timeline` is a view over the tables above. It has no primary key, so it is
// only ever read through raw SQL and is not declared here.

mod auto;
