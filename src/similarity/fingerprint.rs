//! Circular (Morgan-style) structural fingerprints computed from SMILES.
//!
//! The parser understands the subset of SMILES that PubChem emits for
//! canonical and connectivity identifiers: organic-subset and bracket atoms,
//! bond symbols, branches, ring closures (including `%nn`) and disconnected
//! components. Stereo marks are ignored.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

/// Neighbourhood radius of the circular environments.
pub const RADIUS: usize = 2;

const SINGLE: u8 = 1;
const AROMATIC: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmilesError {
    #[error("structure is empty")]
    Empty,
    #[error("unexpected character at offset {0}")]
    UnexpectedChar(usize),
    #[error("unbalanced branch at offset {0}")]
    UnbalancedBranch(usize),
    #[error("bond or ring symbol without an atom at offset {0}")]
    DanglingBond(usize),
    #[error("ring closure {0} is never closed")]
    OpenRing(u32),
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[[^\]\[]+\]|Br|Cl|[BCNOPSFI]|[bcnops]|\*|[()=#$:/\\.-]|%\d{2}|\d")
            .expect("valid regex")
    })
}

#[derive(Debug, Default)]
struct Molecule {
    labels: Vec<String>,
    bonds: Vec<Vec<(usize, u8)>>,
}

impl Molecule {
    fn add_atom(&mut self, label: String) -> usize {
        self.labels.push(label);
        self.bonds.push(Vec::new());
        self.labels.len() - 1
    }

    fn is_aromatic(&self, atom: usize) -> bool {
        self.labels[atom]
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .is_some_and(|c| c.is_ascii_lowercase())
    }

    fn implicit_order(&self, a: usize, b: usize) -> u8 {
        if self.is_aromatic(a) && self.is_aromatic(b) {
            AROMATIC
        } else {
            SINGLE
        }
    }

    fn bond(&mut self, a: usize, b: usize, order: Option<u8>) {
        let order = order.unwrap_or_else(|| self.implicit_order(a, b));
        self.bonds[a].push((b, order));
        self.bonds[b].push((a, order));
    }
}

fn atom_label(token: &str) -> String {
    match token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        Some(inner) => inner
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .chars()
            .filter(|c| *c != '@')
            .collect(),
        None => token.to_string(),
    }
}

fn bond_order(token: &str) -> Option<u8> {
    match token {
        "-" | "/" | "\\" => Some(SINGLE),
        "=" => Some(2),
        "#" => Some(3),
        "$" => Some(5),
        ":" => Some(AROMATIC),
        _ => None,
    }
}

fn ring_number(token: &str) -> Option<u32> {
    token.strip_prefix('%').unwrap_or(token).parse().ok()
}

fn parse_smiles(smiles: &str) -> Result<Molecule, SmilesError> {
    let smiles = smiles.trim();
    let mut mol = Molecule::default();
    let mut prev: Option<usize> = None;
    let mut branches: Vec<usize> = Vec::new();
    let mut pending: Option<u8> = None;
    let mut rings: HashMap<u32, (usize, Option<u8>)> = HashMap::new();
    let mut offset = 0;

    for m in token_re().find_iter(smiles) {
        if m.start() != offset {
            return Err(SmilesError::UnexpectedChar(offset));
        }
        offset = m.end();
        let token = m.as_str();

        match (token, bond_order(token), ring_number(token)) {
            ("(", ..) => {
                let atom = prev.ok_or(SmilesError::UnbalancedBranch(m.start()))?;
                branches.push(atom);
            }
            (")", ..) => {
                if pending.is_some() {
                    return Err(SmilesError::DanglingBond(m.start()));
                }
                prev = Some(branches.pop().ok_or(SmilesError::UnbalancedBranch(m.start()))?);
            }
            (".", ..) => {
                if pending.is_some() {
                    return Err(SmilesError::DanglingBond(m.start()));
                }
                prev = None;
            }
            (_, Some(order), _) => {
                if prev.is_none() || pending.is_some() {
                    return Err(SmilesError::DanglingBond(m.start()));
                }
                pending = Some(order);
            }
            (_, _, Some(ring)) => {
                let atom = prev.ok_or(SmilesError::DanglingBond(m.start()))?;
                let order = pending.take();
                match rings.remove(&ring) {
                    Some((other, opened_with)) => mol.bond(atom, other, order.or(opened_with)),
                    None => {
                        rings.insert(ring, (atom, order));
                    }
                }
            }
            _ => {
                let atom = mol.add_atom(atom_label(token));
                if let Some(p) = prev {
                    mol.bond(p, atom, pending.take());
                }
                prev = Some(atom);
            }
        }
    }

    if offset != smiles.len() {
        return Err(SmilesError::UnexpectedChar(offset));
    }
    if !branches.is_empty() {
        return Err(SmilesError::UnbalancedBranch(offset));
    }
    if pending.is_some() {
        return Err(SmilesError::DanglingBond(offset));
    }
    if let Some(ring) = rings.keys().min() {
        return Err(SmilesError::OpenRing(*ring));
    }
    if mol.labels.is_empty() {
        return Err(SmilesError::Empty);
    }
    Ok(mol)
}

fn hash_bytes(parts: &[&[u8]]) -> u64 {
    let mut ctx = md5::Context::new();
    for part in parts {
        ctx.consume(part);
        ctx.consume([0xffu8]);
    }
    let digest = ctx.compute();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.0[..8]);
    u64::from_le_bytes(head)
}

/// Set of hashed atom environments up to [`RADIUS`] bonds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(HashSet<u64>);

impl Fingerprint {
    pub fn from_smiles(smiles: &str) -> Result<Self, SmilesError> {
        let mol = parse_smiles(smiles)?;

        let mut ids: Vec<u64> = mol
            .labels
            .iter()
            .zip(&mol.bonds)
            .map(|(label, bonds)| {
                let degree = bonds.len() as u32;
                hash_bytes(&[label.as_bytes(), &degree.to_le_bytes()[..]])
            })
            .collect();
        let mut bits: HashSet<u64> = ids.iter().copied().collect();

        for _ in 0..RADIUS {
            ids = mol
                .bonds
                .iter()
                .enumerate()
                .map(|(atom, bonds)| {
                    let mut env: Vec<(u8, u64)> =
                        bonds.iter().map(|(n, order)| (*order, ids[*n])).collect();
                    env.sort_unstable();
                    let mut bytes = ids[atom].to_le_bytes().to_vec();
                    for (order, id) in env {
                        bytes.push(order);
                        bytes.extend_from_slice(&id.to_le_bytes());
                    }
                    hash_bytes(&[bytes.as_slice()])
                })
                .collect();
            bits.extend(ids.iter().copied());
        }

        Ok(Self(bits))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Intersection over union of the two bit sets; 0.0 when both are empty.
    pub fn tanimoto(&self, other: &Self) -> f64 {
        let union = self.0.union(&other.0).count();
        if union == 0 {
            return 0.0;
        }
        let intersection = self.0.intersection(&other.0).count();
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASPIRIN: &str = "CC(=O)OC1=CC=CC=C1C(=O)O";
    const SILDENAFIL: &str = "CCCC1=NN(C2=C1N=C(NC2=O)C3=C(C=CC(=C3)S(=O)(=O)N4CCN(CC4)C)OCC)C";
    const METFORMIN: &str = "CN(C)C(=N)N=C(N)N";

    fn fp(smiles: &str) -> Fingerprint {
        Fingerprint::from_smiles(smiles).unwrap()
    }

    #[test]
    fn parses_rings_branches_and_brackets() {
        let mol = parse_smiles(SILDENAFIL).unwrap();
        assert_eq!(mol.labels.len(), 33);

        let mol = parse_smiles("c1ccccc1").unwrap();
        assert!(mol.bonds.iter().all(|b| b.len() == 2));
        assert!(mol.bonds[0].iter().all(|(_, order)| *order == AROMATIC));

        let mol = parse_smiles("[NH4+].[Cl-]").unwrap();
        assert_eq!(mol.labels, vec!["NH4+", "Cl-"]);
        assert!(mol.bonds.iter().all(Vec::is_empty));

        let mol = parse_smiles("C%10CC%10").unwrap();
        assert_eq!(mol.bonds[0].len(), 2);
    }

    #[test]
    fn rejects_malformed_structures() {
        assert_eq!(parse_smiles("").unwrap_err(), SmilesError::Empty);
        assert_eq!(parse_smiles("C1CC").unwrap_err(), SmilesError::OpenRing(1));
        assert!(matches!(
            parse_smiles("CC)C").unwrap_err(),
            SmilesError::UnbalancedBranch(_)
        ));
        assert!(matches!(
            parse_smiles("C(C").unwrap_err(),
            SmilesError::UnbalancedBranch(_)
        ));
        assert!(matches!(
            parse_smiles("CC=").unwrap_err(),
            SmilesError::DanglingBond(_)
        ));
        assert!(matches!(
            parse_smiles("unknown").unwrap_err(),
            SmilesError::UnexpectedChar(_)
        ));
    }

    #[test]
    fn stereo_marks_do_not_change_the_fingerprint() {
        assert_eq!(fp("C[C@H](N)O"), fp("C[C@@H](N)O"));
        assert_eq!(fp("F/C=C/F"), fp("FC=CF"));
    }

    #[test]
    fn atom_order_does_not_matter() {
        assert_eq!(fp("CCO").tanimoto(&fp("OCC")), 1.0);
    }

    #[test]
    fn tanimoto_bounds() {
        assert_eq!(fp(ASPIRIN).tanimoto(&fp(ASPIRIN)), 1.0);
        assert_eq!(fp("C").tanimoto(&fp("O")), 0.0);

        let ab = fp(ASPIRIN).tanimoto(&fp(SILDENAFIL));
        assert!(ab > 0.0 && ab < 1.0, "got {ab}");
        assert_eq!(ab, fp(SILDENAFIL).tanimoto(&fp(ASPIRIN)));
    }

    #[test]
    fn related_structures_score_higher_than_unrelated() {
        let ethanol_propanol = fp("CCO").tanimoto(&fp("CCCO"));
        let ethanol_metformin = fp("CCO").tanimoto(&fp(METFORMIN));
        assert!(ethanol_propanol > ethanol_metformin);
    }
}
