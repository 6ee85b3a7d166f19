//! Winner selection.

use rand::Rng;

use crate::error::{Error, Result};

/// Pick a winner uniformly at random from the given options.
///
/// This never touches the store; persisting the result is up to the caller.
pub fn draw(options: &[String]) -> Result<&str> {
    draw_with(options, &mut rand::thread_rng())
}

/// Pick a winner using the given source of randomness.
///
/// The index is `floor(roll * len)` for a roll drawn uniformly from `[0, 1)`.
pub fn draw_with<'a, R>(options: &'a [String], rng: &mut R) -> Result<&'a str>
where
    R: Rng + ?Sized,
{
    if options.is_empty() {
        return Err(Error::InvalidState(
            "Cannot draw a winner from zero destination options".to_string(),
        ));
    }

    let roll: f64 = rng.gen();
    // Clamp in case of rounding at the very top of the range.
    let index = ((roll * options.len() as f64).floor() as usize).min(options.len() - 1);
    Ok(&options[index])
}
