use crate::entities::known_or_unknown;
use crate::entities::molecular::MolecularProfile;
use crate::sources::pubchem::PubChemProperties;

pub fn from_pubchem(props: &PubChemProperties, image_url: Option<String>) -> MolecularProfile {
    let weight = props
        .molecular_weight
        .as_ref()
        .and_then(|w| w.to_display());

    MolecularProfile {
        formula: known_or_unknown(props.molecular_formula.as_deref()),
        weight: known_or_unknown(weight.as_deref()),
        identifier: known_or_unknown(props.structure()),
        iupac_name: known_or_unknown(props.iupac_name.as_deref()),
        inchi_key: known_or_unknown(props.inchi_key.as_deref()),
        cid: props.cid,
        image_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::UNKNOWN;

    #[test]
    fn empty_properties_map_to_unknown_profile() {
        let profile = from_pubchem(&PubChemProperties::default(), None);
        assert_eq!(profile, MolecularProfile::unknown());
    }

    #[test]
    fn connectivity_smiles_becomes_identifier() {
        let props = PubChemProperties {
            molecular_formula: Some("C22H30N6O4S".into()),
            connectivity_smiles: Some(
                "CCCC1=NN(C2=C1N=C(NC2=O)C3=C(C=CC(=C3)S(=O)(=O)N4CCN(CC4)C)OCC)C".into(),
            ),
            ..Default::default()
        };
        let profile = from_pubchem(&props, None);
        assert_eq!(profile.formula, "C22H30N6O4S");
        assert!(profile.structure().is_some());
        assert_eq!(profile.weight, UNKNOWN);
    }
}
