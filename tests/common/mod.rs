#![allow(dead_code)]

use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair};
use sane_verifier::dns::{
    DNSResourceType, Dnskey, DomainName, RData, ResourceRecord, Rrsig, Tlsa, encode_records,
};
use sane_verifier::dnssec::{
    AlgorithmPolicy, ChainVerifier, DigestType, RRset, TrustAnchor, signed_data,
};
use sane_verifier::roots::{RootEntry, TrustedRootWindow};
use sane_verifier::urkel::{Bits, Hash, ProofBody, ProofNode, UrkelProof, key_for};

pub const ECDSA_P256: u8 = 13;
pub const TTL: u32 = 3600;

pub fn name(s: &str) -> DomainName {
    s.parse().unwrap()
}

/// A P-256 zone signing key
pub struct ZoneKey {
    pub owner: DomainName,
    pub dnskey: Dnskey,
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl ZoneKey {
    pub fn generate(owner: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).unwrap();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .unwrap();
        // DNSKEY carries the point without the 0x04 prefix
        let public_key = key_pair.public_key().as_ref()[1..].to_vec();
        Self {
            owner: name(owner),
            dnskey: Dnskey {
                flags: 257,
                protocol: 3,
                algorithm: ECDSA_P256,
                public_key,
            },
            key_pair,
            rng,
        }
    }

    pub fn record(&self) -> ResourceRecord {
        ResourceRecord::new(self.owner.clone(), TTL, RData::Dnskey(self.dnskey.clone()))
    }

    pub fn ds(&self) -> ResourceRecord {
        ResourceRecord::new(
            self.owner.clone(),
            TTL,
            RData::Ds(self.dnskey.to_ds(&self.owner, DigestType::Sha256)),
        )
    }

    pub fn anchor(&self) -> TrustAnchor {
        TrustAnchor::new(self.owner.clone(), self.dnskey.clone())
    }

    /// RRSIG by this key over `records`, which must form one RRset
    pub fn sign(&self, records: &[ResourceRecord]) -> ResourceRecord {
        let owner = records[0].name.clone();
        let rtype = records[0].rtype();
        let mut rrsig = Rrsig {
            type_covered: rtype,
            algorithm: self.dnskey.algorithm,
            labels: owner.label_count() as u8,
            original_ttl: TTL,
            expiration: 1_900_000_000,
            inception: 1_600_000_000,
            key_tag: self.dnskey.key_tag(),
            signer_name: self.owner.clone(),
            signature: Vec::new(),
        };
        let rrset = RRset::new(&owner, rtype, records.to_vec()).unwrap();
        let data = signed_data(&rrsig, &rrset).unwrap();
        rrsig.signature = self
            .key_pair
            .sign(&self.rng, &data)
            .unwrap()
            .as_ref()
            .to_vec();
        ResourceRecord::new(owner, TTL, RData::Rrsig(rrsig))
    }
}

pub fn tlsa(data: u8) -> Tlsa {
    Tlsa {
        usage: 3,
        selector: 1,
        matching_type: 1,
        data: vec![data; 32],
    }
}

pub fn tlsa_record(owner: &str, tlsa: Tlsa) -> ResourceRecord {
    ResourceRecord::new(name(owner), TTL, RData::Tlsa(tlsa))
}

/// A signed chain from the root through `zones` down to a TLSA record
pub struct SignedChain {
    pub keys: Vec<ZoneKey>,
    pub records: Vec<ResourceRecord>,
    pub tlsa: ResourceRecord,
}

impl SignedChain {
    /// `zones` lists the delegations below the root, e.g. `["tld", "a.tld"]`.
    pub fn build(zones: &[&str], tlsa: ResourceRecord) -> Self {
        let root = ZoneKey::generate(".");
        let mut records = vec![root.record()];
        records.push(root.sign(&[root.record()]));

        let mut keys = vec![root];
        for zone in zones {
            let key = ZoneKey::generate(zone);
            let parent = keys.last().unwrap();
            records.push(key.ds());
            records.push(parent.sign(&[key.ds()]));
            records.push(key.record());
            records.push(key.sign(&[key.record()]));
            keys.push(key);
        }

        let signer = keys.last().unwrap();
        records.push(tlsa.clone());
        records.push(signer.sign(&[tlsa.clone()]));

        Self {
            keys,
            records,
            tlsa,
        }
    }

    pub fn anchor(&self) -> TrustAnchor {
        self.keys[0].anchor()
    }

    pub fn verifier(&self) -> ChainVerifier {
        ChainVerifier::new(self.anchor(), AlgorithmPolicy::default())
    }

    pub fn payload(&self) -> Vec<u8> {
        encode_records(443, &self.records)
    }

    pub fn target(&self) -> DomainName {
        self.tlsa.name.clone()
    }
}

/// An existence proof for `label` behind `siblings` empty-prefix nodes
pub fn urkel_proof(label: &str, value: &[u8], siblings: u8) -> (Hash, UrkelProof) {
    let nodes = (0..siblings)
        .map(|i| ProofNode {
            prefix: Bits::empty(),
            hash: [i.wrapping_add(1); 32],
        })
        .collect();
    let proof = UrkelProof {
        depth: siblings as u16,
        nodes,
        body: ProofBody::Exists {
            value: value.to_vec(),
        },
    };
    let root = proof.compute_root(&key_for(label)).unwrap();
    (root, proof)
}

/// Extension bytes: count followed by `root || proof` pairs
pub fn urkel_extension(proofs: &[(Hash, UrkelProof)]) -> Vec<u8> {
    let mut out = vec![proofs.len() as u8];
    for (root, proof) in proofs {
        out.extend_from_slice(root);
        out.extend_from_slice(&proof.encode());
    }
    out
}

pub fn window_with(roots: &[Hash]) -> TrustedRootWindow {
    let mut window = TrustedRootWindow::default();
    for (i, root) in roots.iter().enumerate() {
        window.push(RootEntry::new(100 + i as u32, 1_700_000_000, &hex::encode(root)).unwrap());
    }
    window
}

pub fn covered(record: &ResourceRecord) -> Option<DNSResourceType> {
    record.as_rrsig().map(|sig| sig.type_covered)
}
