//! Static domain vocabulary: the chemical-element symbol table and the
//! target alias table.
//!
//! Both tables are loaded once at startup and shared read-only across the
//! pipeline; nothing mutates them after construction.

use std::collections::HashMap;

/// Chemical-element symbols mapped to full element names.
const ELEMENT_SYMBOLS: &[(&str, &str)] = &[
    ("Ac", "Actinium"),
    ("Ag", "Silver"),
    ("Al", "Aluminum"),
    ("Am", "Americium"),
    ("Ar", "Argon"),
    ("As", "Arsenic"),
    ("At", "Astatine"),
    ("Au", "Gold"),
    ("B", "Boron"),
    ("Ba", "Barium"),
    ("Be", "Beryllium"),
    ("Bh", "Bohrium"),
    ("Bi", "Bismuth"),
    ("Bk", "Berkelium"),
    ("Br", "Bromine"),
    ("C", "Carbon"),
    ("Ca", "Calcium"),
    ("Cd", "Cadmium"),
    ("Ce", "Cerium"),
    ("Cf", "Californium"),
    ("Cl", "Chlorine"),
    ("Cm", "Curium"),
    ("Cn", "Copernicium"),
    ("Co", "Cobalt"),
    ("Cr", "Chromium"),
    ("Cs", "Cesium"),
    ("Cu", "Copper"),
    ("Db", "Dubnium"),
    ("Ds", "Darmstadtium"),
    ("Dy", "Dysprosium"),
    ("Er", "Erbium"),
    ("Es", "Einsteinium"),
    ("Eu", "Europium"),
    ("F", "Fluorine"),
    ("Fe", "Iron"),
    ("Fl", "Flerovium"),
    ("Fm", "Fermium"),
    ("Fr", "Francium"),
    ("Ga", "Gallium"),
    ("Gd", "Gadolinium"),
    ("Ge", "Germanium"),
    ("H", "Hydrogen"),
    ("He", "Helium"),
    ("Hf", "Hafnium"),
    ("Hg", "Mercury"),
    ("Ho", "Holmium"),
    ("Hs", "Hassium"),
    ("I", "Iodine"),
    ("In", "Indium"),
    ("Ir", "Iridium"),
    ("K", "Potassium"),
    ("Kr", "Krypton"),
    ("La", "Lanthanum"),
    ("Li", "Lithium"),
    ("Lr", "Lawrencium"),
    ("Lu", "Lutetium"),
    ("Lv", "Livermorium"),
    ("Md", "Mendelevium"),
    ("Mg", "Magnesium"),
    ("Mn", "Manganese"),
    ("Mo", "Molybdenum"),
    ("Mt", "Meitnerium"),
    ("N", "Nitrogen"),
    ("Na", "Sodium"),
    ("Nb", "Niobium"),
    ("Nd", "Neodymium"),
    ("Ne", "Neon"),
    ("Ni", "Nickel"),
    ("No", "Nobelium"),
    ("Np", "Neptunium"),
    ("O", "Oxygen"),
    ("Os", "Osmium"),
    ("P", "Phosphorus"),
    ("Pa", "Protactinium"),
    ("Pb", "Lead"),
    ("Pd", "Palladium"),
    ("Pm", "Promethium"),
    ("Po", "Polonium"),
    ("Pr", "Praseodymium"),
    ("Pt", "Platinum"),
    ("Pu", "Plutonium"),
    ("Ra", "Radium"),
    ("Rb", "Rubidium"),
    ("Re", "Rhenium"),
    ("Rf", "Rutherfordium"),
    ("Rg", "Roentgenium"),
    ("Rh", "Rhodium"),
    ("Rn", "Radon"),
    ("Ru", "Ruthenium"),
    ("S", "Sulfur"),
    ("Sb", "Antimony"),
    ("Sc", "Scandium"),
    ("Se", "Selenium"),
    ("Sg", "Seaborgium"),
    ("Si", "Silicon"),
    ("Sm", "Samarium"),
    ("Sn", "Tin"),
    ("Sr", "Strontium"),
    ("Ta", "Tantalum"),
    ("Tb", "Terbium"),
    ("Tc", "Technetium"),
    ("Te", "Tellurium"),
    ("Th", "Thorium"),
    ("Ti", "Titanium"),
    ("Tl", "Thallium"),
    ("Tm", "Thulium"),
    ("U", "Uranium"),
    ("Uuo", "Ununoctium"),
    ("Uup", "Ununpentium"),
    ("Uus", "Ununseptium"),
    ("Uut", "Ununtrium"),
    ("V", "Vanadium"),
    ("W", "Tungsten"),
    ("Xe", "Xenon"),
    ("Y", "Yttrium"),
    ("Yb", "Ytterbium"),
    ("Zn", "Zinc"),
    ("Zr", "Zirconium"),
];

/// Known misspellings and shorthand forms of target names, mapped to their
/// canonical (normalized, underscore-joined) forms. Keys are already in
/// canonical casing so they can be matched after normalization.
const TARGET_ALIASES: &[(&str, &str)] = &[
    // MPF
    ("B._Bill", "Barnacle_Bill"),
    ("Bakers_Bench", "Baker's_Bench"),
    ("Bambam", "Bam_Bam"),
    ("Bamm_Bamm", "Bam_Bam"),
    ("Fat_Top", "Flat_Top"),
    ("Garak", "Garrak"),
    ("Ga_Rrak", "Garrak"),
    ("H._Dome", "Half_Dome"),
    ("Hobbs", "Hobbes"),
    ("Mini-Matterhorn", "Mini_Matterhorn"),
    ("Mm", "Mini_Matterhorn"),
    ("Poohbear", "Pooh_Bear"),
    ("Scooby", "Scooby_Doo"),
    ("Souffl", "Soufflé"),
    ("Souffle", "Soufflé"),
    ("Souffle'", "Soufflé"),
    ("Soufle", "Soufflé"),
    // PHX
    ("Bb", "Baby_Bear"),
    ("Bc", "Burning_Coals"),
    ("Bears_Lodge", "Bear's_Lodge"),
    ("Dg", "Dodo_Goldilocks"),
    ("D_G", "Dodo_Goldilocks"),
    ("Dodo", "Dodo_Goldilocks"),
    ("Dodogoldilocks", "Dodo_Goldilocks"),
    ("Dodo-goldilocks", "Dodo_Goldilocks"),
    ("Dodogoldilocks_Trench", "Dodo_Goldilocks_Trench"),
    ("Dodo-goldilocks_Trench", "Dodo_Goldilocks_Trench"),
    ("Dodo-Goldilocks_Trench", "Dodo_Goldilocks_Trench"),
    ("Dodo_Trench", "Dodo_Goldilocks_Trench"),
    ("Lamancha", "La_Mancha"),
    ("Mamma_Bear", "Mama_Bear"),
    ("Mancha", "La_Mancha"),
    ("Rr", "Rosy_Red"),
    ("Rr1", "Rosy_Red"),
    ("Rr2", "Rosy_Red"),
    ("Ww", "Wicked_Witch"),
];

/// Immutable domain vocabulary shared across the pipeline.
#[derive(Debug, Clone)]
pub struct Lexicon {
    elements: HashMap<String, String>,
    target_aliases: HashMap<String, String>,
}

impl Lexicon {
    /// Build the lexicon from the built-in tables.
    pub fn builtin() -> Self {
        Self {
            elements: ELEMENT_SYMBOLS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            target_aliases: TARGET_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Look up the full element name for a symbol (e.g. "Fe" -> "Iron").
    pub fn element(&self, symbol: &str) -> Option<&str> {
        self.elements.get(symbol).map(String::as_str)
    }

    /// Look up the canonical target name for a known alias.
    pub fn target_alias(&self, name: &str) -> Option<&str> {
        self.target_aliases.get(name).map(String::as_str)
    }

    /// Add or replace a target alias. Intended for configuration load time
    /// only; the lexicon must not be mutated once the pipeline starts.
    pub fn add_target_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.target_aliases.insert(alias.into(), canonical.into());
    }

    /// Number of element symbols known.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_lookup() {
        let lex = Lexicon::builtin();
        assert_eq!(lex.element("Fe"), Some("Iron"));
        assert_eq!(lex.element("K"), Some("Potassium"));
        assert_eq!(lex.element("Xx"), None);
    }

    #[test]
    fn test_target_alias_lookup() {
        let lex = Lexicon::builtin();
        assert_eq!(lex.target_alias("Scooby"), Some("Scooby_Doo"));
        assert_eq!(lex.target_alias("Gale"), None);
    }

    #[test]
    fn test_alias_extension() {
        let mut lex = Lexicon::builtin();
        lex.add_target_alias("Gc", "Gale_Crater");
        assert_eq!(lex.target_alias("Gc"), Some("Gale_Crater"));
    }

    #[test]
    fn test_all_stable_elements_present() {
        let lex = Lexicon::builtin();
        assert!(lex.element_count() > 100);
    }
}
