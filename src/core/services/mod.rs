pub mod enrollment;

pub use enrollment::{
    BiometricService, ResetScope, StatusReport, SubScores, TrainOutcome, VerifyOutcome,
};
