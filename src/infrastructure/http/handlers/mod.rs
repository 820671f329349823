//! HTTP Handlers

mod generate;
mod novel;
mod ping;
mod storyline;
mod stream;

pub use generate::*;
pub use novel::*;
pub use ping::*;
pub use storyline::*;
pub use stream::*;
