// Tue Jan 13 2026 - Alex

use crate::signature::SignatureError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Obfuscator product a signature attributes input to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Luraph,
    LuraphBit32,
    SynapseX,
    Byfron,
    Orion,
    Krypteri,
    IronBrew,
    MoonSec,
    GenericVm,
    XorObfuscated,
    Unknown,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::Luraph => "Luraph",
            Family::LuraphBit32 => "Luraph Bit32",
            Family::SynapseX => "Synapse X",
            Family::Byfron => "Byfron",
            Family::Orion => "Orion",
            Family::Krypteri => "Krypteri",
            Family::IronBrew => "IronBrew",
            Family::MoonSec => "MoonSec",
            Family::GenericVm => "Generic VM",
            Family::XorObfuscated => "Xor Obfuscated",
            Family::Unknown => "Unknown",
        }
    }

    /// Virtual-machine based obfuscators carry "VM" in their name.
    pub fn is_vm(&self) -> bool {
        self.name().contains("VM")
    }

    pub fn is_unknown(&self) -> bool {
        *self == Family::Unknown
    }
}

impl Default for Family {
    fn default() -> Self {
        Family::Unknown
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub struct Signature {
    id: String,
    family: Family,
    matcher: Regex,
    confidence_weight: u32,
}

impl Signature {
    pub fn new(id: &str, family: Family, pattern: &str) -> Result<Self, SignatureError> {
        let matcher = RegexBuilder::new(pattern)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|source| SignatureError::InvalidPattern {
                id: id.to_string(),
                source,
            })?;

        Ok(Self {
            id: id.to_string(),
            family,
            matcher,
            confidence_weight: 10,
        })
    }

    pub fn with_confidence_weight(mut self, weight: u32) -> Self {
        self.confidence_weight = weight;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    pub fn confidence_weight(&self) -> u32 {
        self.confidence_weight
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    pub fn to_match(&self) -> SignatureMatch {
        SignatureMatch {
            id: self.id.clone(),
            family: self.family,
            weight: self.confidence_weight,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.family)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("pattern", &self.matcher.as_str())
            .field("confidence_weight", &self.confidence_weight)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMatch {
    pub id: String,
    pub family: Family,
    pub weight: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_marker() {
        assert!(Family::GenericVm.is_vm());
        assert!(!Family::MoonSec.is_vm());
        assert!(!Family::Unknown.is_vm());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Signature::new("broken", Family::Orion, "(unclosed").unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_signature_matches() {
        let sig = Signature::new("moonsec_banner", Family::MoonSec, r"(?i)--\[\[MOONSEC\]\]").unwrap();
        assert!(sig.matches("--[[moonsec]]\nprint(1)"));
        assert!(!sig.matches("print('moonsec')"));
        assert_eq!(sig.to_match().weight, 10);
    }
}
