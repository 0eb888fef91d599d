// Reverse-mode automatic differentiation without an explicit graph object.
// Every primitive returns a unit that owns (or borrows) its operands; the nesting of those
// units is the graph, and dropping the outermost one walks it backwards.

pub mod math;
pub mod operand;
pub mod ops;
pub mod unit;
pub mod var;
mod tests;

pub use math::log_softmax;
pub use operand::{Operand, ValueRef};
pub use ops::{
    add, add_into, exp, logsumexp, matmul, matmul_into, mul, mul_into, neg, sigmoid, sub,
    sub_into, tanh,
};
pub use unit::{Op, Shared, Unit};
pub use var::Var;
