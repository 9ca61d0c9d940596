// src/common/id_generator.rs
//! Prefixed Crockford Base32 identifiers, e.g. `R_K7NP3XQ2` for a resume.
//!
//! The alphabet leaves out I, L, O and U so IDs survive being read aloud.

use rand::Rng;

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Random characters after the prefix
const RANDOM_LEN: usize = 8;

fn crockford_id(prefix: char) -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(RANDOM_LEN + 2);
    id.push(prefix);
    id.push('_');
    id.extend((0..RANDOM_LEN).map(|_| CROCKFORD_ALPHABET[rng.gen_range(0..32)] as char));
    id
}

pub fn generate_resume_id() -> String {
    crockford_id('R')
}

pub fn generate_company_id() -> String {
    crockford_id('C')
}

pub fn generate_keyword_id() -> String {
    crockford_id('K')
}
