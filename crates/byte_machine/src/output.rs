use heapless::Vec;

use crate::Word;

/// Destination of the values written by `PRINT`.
pub trait Output {
    /// Emits one value. An `Err` aborts the running program.
    fn print(&mut self, value: Word) -> Result<(), OutputError>;
}

/// The sink could not accept the value.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct OutputError;

/// Collects printed values, failing once `N` have been captured.
impl<const N: usize> Output for Vec<Word, N> {
    fn print(&mut self, value: Word) -> Result<(), OutputError> {
        self.push(value).map_err(|_| OutputError)
    }
}

impl<O: Output + ?Sized> Output for &mut O {
    fn print(&mut self, value: Word) -> Result<(), OutputError> {
        (**self).print(value)
    }
}
