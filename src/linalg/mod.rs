pub mod solver;
pub mod direct;
pub mod iterative;
pub mod ring;
pub mod anderson;

pub use solver::{LinearOperator, SolverStats, SolverUtils};
pub use direct::DirectSolver;
pub use iterative::ConjugateGradient;
pub use ring::HistoryRing;
pub use anderson::AndersonMixer;
