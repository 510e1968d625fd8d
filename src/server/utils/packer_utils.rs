// p.a.c.k.e.r. unpacker. a few of the embed players hide their manifest behind
// eval(function(p,a,c,k,e,d){...}('payload',radix,count,'sym|bol|table'.split('|'),0,{}))
// and this puts the symbols back where the tokens are
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::unbaser_utils::{UnbaseError, Unbaser};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnpackError {
    #[error("Not a P.A.C.K.E.R. coded file")]
    NotPacked,
    #[error("Could not make sense of p.a.c.k.e.r data (unexpected code structure)")]
    MalformedInput,
    #[error("Malformed p.a.c.k.e.r. symtab ({declared} != {actual})")]
    MalformedSymbolTable { declared: usize, actual: usize },
    #[error("Unsupported base encoding: {0}")]
    UnsupportedRadix(u32),
}

// spaces are allowed anywhere in the signature, same as stripping them before searching
static SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"eval *\( *function *\( *p *, *a *, *c *, *k *, *e *,")
        .expect("signature regex should compile")
});

// the two call shapes a packed script ends with, tried in this order. the first one carries the
// extra decoder arguments (`,0,{}`), the second is the bare four argument call
static CALL_SHAPES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(
            r"(?s)\}\(('.*?'), *(\d+|\[\]), *(\d+), *'(.*?)'\.split\('\|'\), *(\d+), *(.*?)\)\)",
        )
        .expect("call shape regex should compile"),
        Regex::new(r"(?s)\}\(('.*?'), *(\d+|\[\]), *(\d+), *'(.*?)'\.split\('\|'\)\)")
            .expect("call shape regex should compile"),
    ]
});

/// arguments pulled out of the packed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackerArgs {
    pub payload: String,
    pub symbols: Vec<String>,
    pub radix: u32,
    pub count: usize,
}

impl PackerArgs {
    /// matches the argument list against the accepted call shapes
    pub fn parse(source: &str) -> Result<Self, UnpackError> {
        for (shape, regex) in CALL_SHAPES.iter().enumerate() {
            let Some(caps) = regex.captures(source) else {
                trace!("packer call shape {} did not match", shape);
                continue;
            };

            // `[]` is the packer's way of saying "default", which is base 62
            let radix = match &caps[2] {
                "[]" => 62,
                raw => raw.parse().map_err(|_| UnpackError::MalformedInput)?,
            };
            let count = caps[3].parse().map_err(|_| UnpackError::MalformedInput)?;

            let quoted = &caps[1];
            let payload = quoted[1..quoted.len() - 1].to_string();
            let symbols = caps[4].split('|').map(String::from).collect();

            debug!("packer call shape {} matched", shape);
            return Ok(Self {
                payload,
                symbols,
                radix,
                count,
            });
        }

        Err(UnpackError::MalformedInput)
    }
}

pub struct PackerUtil;

impl PackerUtil {
    pub fn detect(source: &str) -> bool {
        SIGNATURE.is_match(source)
    }

    /// rebuilds the script a packed source evaluates to
    ///
    /// whatever came before the packed call and after its closing parens is kept as-is around
    /// the unpacked payload
    pub fn unpack(source: &str) -> Result<String, UnpackError> {
        let Some(signature) = SIGNATURE.find(source) else {
            return Err(UnpackError::NotPacked);
        };

        let prefix = &source[..signature.start()];
        let suffix = Self::suffix(source);
        debug!(
            "unpacking {} bytes (prefix {}, suffix {})",
            source.len(),
            prefix.len(),
            suffix.len()
        );

        let args = PackerArgs::parse(source)?;
        debug!(
            "radix {}, declared {} symbols, table has {}, payload {} bytes",
            args.radix,
            args.count,
            args.symbols.len(),
            args.payload.len()
        );

        if args.count != args.symbols.len() {
            return Err(UnpackError::MalformedSymbolTable {
                declared: args.count,
                actual: args.symbols.len(),
            });
        }

        let unbaser = Unbaser::new(args.radix).map_err(|e| match e {
            UnbaseError::UnsupportedRadix(radix) => UnpackError::UnsupportedRadix(radix),
            UnbaseError::Decode { .. } => UnpackError::MalformedInput,
        })?;

        let payload = Self::substitute(&args.payload, &args.symbols, &unbaser);

        Ok(format!("{}{}{}", prefix, payload, suffix))
    }

    /// unpacks when the source is packed and hands it back untouched when it isn't
    ///
    /// only a missing signature falls back, a packed script we can't read is still an error
    pub fn unpack_or_plain(source: &str) -> Result<String, UnpackError> {
        match Self::unpack(source) {
            Ok(unpacked) => Ok(unpacked),
            Err(UnpackError::NotPacked) => {
                debug!("source is not packed, using it as plain text");
                Ok(source.to_string())
            }
            Err(e) => {
                warn!("packed source could not be unpacked: {}", e);
                Err(e)
            }
        }
    }

    // the string payload form closes with ')))', the plain function form with '}))'
    fn suffix(source: &str) -> &str {
        let closing = if source.contains("')))") { "')))" } else { "}))" };
        source
            .split_once(closing)
            .map(|(_, rest)| rest)
            .unwrap_or("")
    }

    /// swaps every word token for its symbol table entry
    ///
    /// tokens that don't decode in the radix (packed english strings mostly) or point at an empty
    /// entry stay as they are
    fn substitute(payload: &str, symbols: &[String], unbaser: &Unbaser) -> String {
        let mut output = String::with_capacity(payload.len());
        let mut misses = 0usize;

        for (is_word, piece) in WordTokens::new(payload) {
            if !is_word {
                output.push_str(piece);
                continue;
            }

            let replacement = match unbaser.unbase(piece) {
                Ok(index) => usize::try_from(index)
                    .ok()
                    .and_then(|i| symbols.get(i))
                    .filter(|symbol| !symbol.is_empty()),
                Err(_) => {
                    misses += 1;
                    None
                }
            };

            output.push_str(replacement.map(String::as_str).unwrap_or(piece));
        }

        trace!("{} tokens did not decode in base {}", misses, unbaser.radix());
        output
    }
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// splits text into maximal `[A-Za-z0-9_]` runs and everything in between
struct WordTokens<'a> {
    rest: &'a str,
}

impl<'a> WordTokens<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for WordTokens<'a> {
    type Item = (bool, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let first = *self.rest.as_bytes().first()?;
        let is_word = is_word_byte(first);

        // word bytes are ascii so the split always lands on a char boundary
        let end = self
            .rest
            .bytes()
            .position(|b| is_word_byte(b) != is_word)
            .unwrap_or(self.rest.len());

        let (piece, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some((is_word, piece))
    }
}
