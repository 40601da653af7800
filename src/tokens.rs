//! Token estimates for generated documents.
//!
//! Counts with tiktoken-rs when its tables load, otherwise with a
//! four-bytes-per-token approximation.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// Tokenizer used for estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// GPT-4 and GPT-3.5 family.
    #[default]
    Cl100kBase,
    /// GPT-4o family.
    O200kBase,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::O200kBase => "o200k_base",
        })
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Encoding::Cl100kBase),
            "o200k" | "o200k_base" => Ok(Encoding::O200kBase),
            _ => Err(format!("unknown encoding: {s}")),
        }
    }
}

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn tokenizer(encoding: Encoding) -> Option<&'static CoreBPE> {
    let cell = match encoding {
        Encoding::Cl100kBase => &CL100K,
        Encoding::O200kBase => &O200K,
    };
    cell.get_or_init(|| match encoding {
        Encoding::Cl100kBase => tiktoken_rs::cl100k_base().ok(),
        Encoding::O200kBase => tiktoken_rs::o200k_base().ok(),
    })
    .as_ref()
}

fn approximate(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens with the default encoding.
///
/// ```
/// use codesynth::tokens::count_tokens;
///
/// assert!(count_tokens("fn main() {}") > 0);
/// ```
pub fn count_tokens(text: &str) -> usize {
    count_tokens_with_encoding(text, Encoding::default())
}

pub fn count_tokens_with_encoding(text: &str, encoding: Encoding) -> usize {
    match tokenizer(encoding) {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => approximate(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_markdown_document() {
        let text = "# Source Code Documentation\n\n## File: a.py\n\n```python\nprint(1)\n```\n";
        let count = count_tokens(text);
        assert!(count > 5 && count < text.len());
    }

    #[test]
    fn test_approximation() {
        assert_eq!(approximate(""), 0);
        assert_eq!(approximate("a"), 1);
        assert_eq!(approximate("abcd"), 1);
        assert_eq!(approximate("abcde"), 2);
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("cl100k".parse::<Encoding>(), Ok(Encoding::Cl100kBase));
        assert_eq!("O200K_BASE".parse::<Encoding>(), Ok(Encoding::O200kBase));
        assert!("gpt2".parse::<Encoding>().is_err());
        assert_eq!(Encoding::O200kBase.to_string(), "o200k_base");
    }
}
