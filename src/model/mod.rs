mod cell;
mod config;
mod lm;
mod loss;
mod lstm;
mod projection;
mod srn;
mod state;

pub use cell::{Cell, RecurrentCell};
pub use config::{RecurrentLmConfig, build_model_config};
pub use lm::RecurrentLm;
pub use loss::{language_model_loss, log2_likelihood};
pub use lstm::{LstmCell, LstmGate};
pub use projection::Projection;
pub use srn::SrnCell;
pub use state::RecurrentState;
