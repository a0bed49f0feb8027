// Copyright (c) 2026 rezky_nightky

use std::char;

use rand::Rng;

pub const MATRIX_CHARS: &str =
    "01ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789@#$%^&*()_+-=[]{}|;:,.<>?";

pub const GLITCH_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

const FALLBACK_GLYPH: &str = "0";

/// Code fragments grouped by flavor, with the weight each bucket carries in the pool.
const TOKEN_BUCKETS: &[(&str, f32, &[&str])] = &[
    (
        "symbols",
        3.0,
        &[
            "{", "}", "(", ")", "[", "]", "<", ">", "</>", "::", "=>", "==", "===", "!=", "!==",
            "?", ":", ";", ",", ".", "…", "|", "||", "&", "&&", "~", "^", "%", "+", "-", "*", "/",
            "\\", "->", "<-", "=>",
        ],
    ),
    (
        "regex",
        1.5,
        &[
            "/", "\\", "\\d", "\\w", "\\s", "\\b", "\\B", "^", "$", ".*", ".*?", "+?", "?:",
            "(?=)", "(?! )", "(?<)", "(?<=)", "(?<! )", "[A-Z]", "[a-z]", "\\n", "\\t",
        ],
    ),
    (
        "literals",
        1.5,
        &[
            "0", "1", "42", "3.14", "0xFF", "NaN", "null", "undefined", "true", "false",
        ],
    ),
    (
        "core",
        2.0,
        &[
            "if", "else", "for", "while", "do", "in", "of", "new", "try", "catch", "finally",
            "break", "continue", "switch", "case", "return", "yield", "await", "async",
        ],
    ),
    (
        "js",
        2.0,
        &[
            "let", "const", "var", "class", "extends", "import", "from", "export", "default",
            "this", "super", "typeof", "instanceof",
        ],
    ),
    (
        "py",
        1.8,
        &[
            "def", "class", "self", "None", "lambda", "with", "as", "yield", "async", "await",
            "elif", "pass",
        ],
    ),
    (
        "c",
        1.0,
        &[
            "int", "char", "void", "auto", "enum", "struct", "using", "namespace", "public",
            "private", "protected", "static", "virtual", "override",
        ],
    ),
    (
        "htmlcss",
        1.0,
        &[
            "<div>", "</div>", "<span>", "</span>", "<a>", "</a>", "<ul>", "</ul>", "<li>",
            "</li>", "<p>", "</p>", "{ }", ":root", "--var", "calc()", "rem", "px",
        ],
    ),
    (
        "bits",
        1.5,
        &["0", "1", "001", "010", "101", "110", "0110", "1010", "0011"],
    ),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlyphSet {
    Matrix,
    Tokens,
    Binary,
}

pub fn glyph_set_from_str(spec: &str) -> Result<GlyphSet, String> {
    match spec.trim().to_ascii_lowercase().as_str() {
        "matrix" | "auto" => Ok(GlyphSet::Matrix),
        "tokens" | "code" => Ok(GlyphSet::Tokens),
        "binary" | "bin" | "01" => Ok(GlyphSet::Binary),
        other => Err(format!("unsupported glyph set: {} (matrix, tokens, binary)", other)),
    }
}

/// A bag of glyphs sampled uniformly. Duplicates act as weights.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphPool {
    glyphs: Vec<String>,
}

impl GlyphPool {
    pub fn from_chars<I: IntoIterator<Item = char>>(chars: I) -> Self {
        Self {
            glyphs: chars.into_iter().map(String::from).collect(),
        }
    }

    pub fn matrix() -> Self {
        Self::from_chars(MATRIX_CHARS.chars())
    }

    pub fn glitch() -> Self {
        Self::from_chars(GLITCH_CHARS.chars())
    }

    pub fn binary() -> Self {
        Self::from_chars(['0', '1'])
    }

    /// Weighted code-token pool; each token appears `ceil(weight)` times when its
    /// char length is within `min_len..=max_len`.
    pub fn code_tokens(min_len: usize, max_len: usize) -> Self {
        let mut glyphs = Vec::new();
        for (_, weight, tokens) in TOKEN_BUCKETS {
            let reps = weight.ceil().max(1.0) as usize;
            for token in tokens.iter() {
                let len = token.chars().count();
                if len < min_len || len > max_len {
                    continue;
                }
                for _ in 0..reps {
                    glyphs.push((*token).to_string());
                }
            }
        }
        Self { glyphs }
    }

    pub fn for_set(set: GlyphSet) -> Self {
        match set {
            GlyphSet::Matrix => Self::matrix(),
            GlyphSet::Tokens => Self::code_tokens(1, 6),
            GlyphSet::Binary => Self::binary(),
        }
    }

    pub fn contains(&self, glyph: &str) -> bool {
        self.glyphs.iter().any(|g| g == glyph)
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> &str {
        if self.glyphs.is_empty() {
            return FALLBACK_GLYPH;
        }
        let idx = rng.random_range(0..self.glyphs.len());
        &self.glyphs[idx]
    }
}

pub fn parse_user_hex_chars(s: &str) -> Result<Vec<char>, String> {
    let mut out = Vec::new();
    for (i, part) in s.split(',').enumerate() {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let v = u32::from_str_radix(part, 16)
            .map_err(|_| format!("invalid hex char at index {}", i + 1))?;
        let ch = char::from_u32(v)
            .ok_or_else(|| format!("invalid unicode scalar at index {}", i + 1))?;
        out.push(ch);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn parse_user_hex_chars_parses_hex_codepoints() {
        let v = parse_user_hex_chars("30,31").unwrap();
        assert_eq!(v, vec!['0', '1']);
        assert!(parse_user_hex_chars("zz").is_err());
    }

    #[test]
    fn empty_pool_falls_back_to_default_glyph() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(GlyphPool::default().pick(&mut rng), "0");
    }

    #[test]
    fn token_pool_repeats_by_weight_and_filters_length() {
        let pool = GlyphPool::code_tokens(1, 6);
        // symbols weigh 3.0, so "{" shows up three times; "c" bucket weighs 1.0.
        assert_eq!(pool.glyphs.iter().filter(|g| *g == "{").count(), 3);
        assert_eq!(pool.glyphs.iter().filter(|g| *g == "void").count(), 1);
        assert!(!pool.contains("undefined"));
        assert!(!pool.contains("instanceof"));

        let short = GlyphPool::code_tokens(4, 4);
        assert!(short.glyphs.iter().all(|g| g.chars().count() == 4));
    }

    #[test]
    fn picks_stay_inside_the_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = GlyphPool::binary();
        for _ in 0..100 {
            let g = pool.pick(&mut rng);
            assert!(g == "0" || g == "1");
        }
    }

    #[test]
    fn glyph_set_names() {
        assert_eq!(glyph_set_from_str("Tokens"), Ok(GlyphSet::Tokens));
        assert!(glyph_set_from_str("runic").is_err());
    }
}
