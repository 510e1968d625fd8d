use once_cell::sync::Lazy;
use thiserror::Error;

pub const ALPHABET_62: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const ALPHABET_95: &str =
    " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

type LookupTable = [Option<u8>; 128];

// both alphabets are pure ascii so a 128 slot table covers every char we could ever look up
static TABLE_62: Lazy<LookupTable> = Lazy::new(|| build_table(ALPHABET_62));
static TABLE_95: Lazy<LookupTable> = Lazy::new(|| build_table(ALPHABET_95));

fn build_table(alphabet: &str) -> LookupTable {
    let mut table = [None; 128];
    for (index, byte) in alphabet.bytes().enumerate() {
        table[byte as usize] = Some(index as u8);
    }
    table
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnbaseError {
    #[error("unsupported base encoding: {0}")]
    UnsupportedRadix(u32),
    #[error("can't decode '{token}' in base {radix}")]
    Decode { token: String, radix: u32 },
}

/// turns packer tokens back into integers
///
/// 2..=36 is normal positional parsing, anything above goes through an alphabet table. 37..=61
/// are just the 62 alphabet cut short so they share its table and bound the index by the radix.
#[derive(Debug, Clone, Copy)]
pub struct Unbaser {
    radix: u32,
    table: Option<&'static LookupTable>,
}

impl Unbaser {
    pub fn new(radix: u32) -> Result<Self, UnbaseError> {
        let table = match radix {
            2..=36 => None,
            37..=62 => Some(&*TABLE_62),
            95 => Some(&*TABLE_95),
            _ => return Err(UnbaseError::UnsupportedRadix(radix)),
        };

        Ok(Self { radix, table })
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    pub fn unbase(&self, token: &str) -> Result<u64, UnbaseError> {
        match self.table {
            None => self.unbase_positional(token),
            Some(table) => self.unbase_dictionary(token, table),
        }
    }

    fn decode_error(&self, token: &str) -> UnbaseError {
        UnbaseError::Decode {
            token: token.to_string(),
            radix: self.radix,
        }
    }

    fn unbase_positional(&self, token: &str) -> Result<u64, UnbaseError> {
        // from_str_radix takes a leading sign, packer tokens never have one
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(self.decode_error(token));
        }

        u64::from_str_radix(token, self.radix).map_err(|_| self.decode_error(token))
    }

    fn unbase_dictionary(&self, token: &str, table: &LookupTable) -> Result<u64, UnbaseError> {
        if token.is_empty() {
            return Err(self.decode_error(token));
        }

        let radix = u64::from(self.radix);
        let mut value: u64 = 0;
        let mut weight: u64 = 1;

        for (position, ch) in token.chars().rev().enumerate() {
            let digit = table
                .get(ch as usize)
                .copied()
                .flatten()
                .map(u64::from)
                .filter(|digit| *digit < radix)
                .ok_or_else(|| self.decode_error(token))?;

            if position > 0 {
                weight = weight
                    .checked_mul(radix)
                    .ok_or_else(|| self.decode_error(token))?;
            }

            value = digit
                .checked_mul(weight)
                .and_then(|term| value.checked_add(term))
                .ok_or_else(|| self.decode_error(token))?;
        }

        Ok(value)
    }
}
