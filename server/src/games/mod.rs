//! Games that ship with the server.

mod guess;

pub use guess::GuessMyNumber;
