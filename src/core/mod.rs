pub mod constants;
pub mod crossfader;
pub mod deck;
pub mod dynamics;
pub mod error;
pub mod instruments;
pub mod mixer;
pub mod recording;
pub mod sequencer;
pub mod track;
pub mod transport;
pub mod wav;

pub use crossfader::*;
pub use deck::*;
pub use dynamics::*;
pub use error::*;
pub use instruments::*;
pub use mixer::*;
pub use recording::*;
pub use sequencer::*;
pub use track::*;
pub use transport::*;
