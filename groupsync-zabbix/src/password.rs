//! Initial passwords for created users.
//!
//! Users authenticate against the directory, so the local password is never
//! handed out; it only has to be unguessable.

use rand::seq::SliceRandom;
use rand::Rng;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const PUNCTUATION: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

pub const MIN_LEN: usize = 8;
pub const MAX_LEN: usize = 12;

pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

pub fn generate_with<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(MIN_LEN..=MAX_LEN);
    let alphabet: Vec<u8> = [LETTERS, DIGITS, PUNCTUATION].concat();
    (0..len)
        .filter_map(|_| alphabet.choose(rng).copied())
        .map(char::from)
        .collect()
}
