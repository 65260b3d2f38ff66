// Tue Jan 13 2026 - Alex

use crate::signature::{Family, Signature, SignatureError, SignatureMatch};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Ordered signature table. Earlier entries win when several match.
const DEFAULT_SIGNATURES: &[(&str, Family, &str)] = &[
    ("luraph_banner", Family::Luraph, r"(?i)--\[\[.*Luraph.*\]\]"),
    ("luraph_bit32", Family::LuraphBit32, r"(?i)bit32\.(extract|lshift|rshift|bxor|band|bnot|bor)"),
    ("synapse_sinmputation", Family::SynapseX, r"(?i)synapse x.*sinmputation\)"),
    ("byfron_loader", Family::Byfron, r"(?i)Byfron.*wait\(.*loadstring\)"),
    ("orion_execute", Family::Orion, r"(?i)Orion.*execute\("),
    ("krypteri_secure_call", Family::Krypteri, r"(?i)Kypteri.*secure_call"),
    ("ironbrew_banner", Family::IronBrew, r"(?i)IronBrew.*obfuscator"),
    ("moonsec_raid", Family::MoonSec, r"(?i)MoonSec.*raid"),
    ("moonsec_banner", Family::MoonSec, r"(?i)--\[\[MOONSEC\]\]"),
    ("generic_vm_opcode", Family::GenericVm, r"VM\.[A-Z]+\("),
    ("xor_activated", Family::XorObfuscated, r"(?i)xor[\s_]*activated\s*=?\s*true"),
];

static DEFAULT_CATALOG: Lazy<Arc<SignatureCatalog>> = Lazy::new(|| match SignatureCatalog::with_default_signatures() {
    Ok(catalog) => Arc::new(catalog),
    Err(e) => {
        log::error!("Failed to build default signature catalog: {}", e);
        Arc::new(SignatureCatalog::new())
    }
});

#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub family: Family,
    pub matches: Vec<SignatureMatch>,
}

impl Detection {
    pub fn is_detected(&self) -> bool {
        !self.matches.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SignatureCatalog {
    signatures: Vec<Signature>,
}

impl SignatureCatalog {
    pub fn new() -> Self {
        Self { signatures: Vec::new() }
    }

    pub fn with_default_signatures() -> Result<Self, SignatureError> {
        let mut catalog = Self::new();
        for &(id, family, pattern) in DEFAULT_SIGNATURES {
            catalog.add(Signature::new(id, family, pattern)?)?;
        }
        Ok(catalog)
    }

    /// The shared read-only catalog, built on first use.
    pub fn global() -> &'static SignatureCatalog {
        DEFAULT_CATALOG.as_ref()
    }

    pub fn shared() -> Arc<SignatureCatalog> {
        Arc::clone(&DEFAULT_CATALOG)
    }

    pub fn add(&mut self, signature: Signature) -> Result<(), SignatureError> {
        if self.signatures.iter().any(|s| s.id() == signature.id()) {
            return Err(SignatureError::DuplicateId(signature.id().to_string()));
        }
        self.signatures.push(signature);
        Ok(())
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn identify(&self, text: &str) -> Family {
        self.signatures
            .iter()
            .find(|s| s.matches(text))
            .map(Signature::family)
            .unwrap_or_default()
    }

    pub fn detect(&self, text: &str) -> Detection {
        let matches: Vec<SignatureMatch> = self
            .signatures
            .iter()
            .filter(|s| s.matches(text))
            .map(Signature::to_match)
            .collect();

        let family = matches.first().map(|m| m.family).unwrap_or_default();
        Detection { family, matches }
    }

    pub fn families(&self) -> Vec<Family> {
        let mut families: Vec<Family> = Vec::new();
        for sig in &self.signatures {
            if !families.contains(&sig.family()) {
                families.push(sig.family());
            }
        }
        families
    }
}
