mod eval;
mod model;
mod normalize;
mod semantics;
mod validate;


pub use eval::{EvalError, FieldPresence, RowState, eval};
pub use model::{CompareOp, Expr};
pub use normalize::{RowKeyInPredicateError, normalize};
pub use semantics::{IncomparableValues, Truth, compare, like_matches};
pub use validate::{ValidateError, validate};
