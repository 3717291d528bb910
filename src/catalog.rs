//! The answer catalog
//!
//! This module holds the closed set of creature labels the game draws its
//! questions from. Each label's numeric identifier is its 1-based position
//! in the embedded list, which is also the number used to resolve the
//! creature's picture. The catalog never changes at runtime.

use std::{collections::HashMap, sync::LazyLock};

use thiserror::Error;

/// The embedded label list, one label per line, in identifier order.
static BUILTIN_LABELS: &str = "bulbasaur
ivysaur
venusaur
charmander
charmeleon
charizard
squirtle
wartortle
blastoise
caterpie
metapod
butterfree
weedle
kakuna
beedrill
pidgey
pidgeotto
pidgeot
rattata
raticate
spearow
fearow
ekans
arbok
pikachu
raichu
sandshrew
sandslash
nidoran-f
nidorina
nidoqueen
nidoran-m
nidorino
nidoking
clefairy
clefable
vulpix
ninetales
jigglypuff
wigglytuff
zubat
golbat
oddish
gloom
vileplume
paras
parasect
venonat
venomoth
diglett
dugtrio
meowth
persian
psyduck
golduck
mankey
primeape
growlithe
arcanine
poliwag
poliwhirl
poliwrath
abra
kadabra
alakazam
machop
machoke
machamp
bellsprout
weepinbell
victreebel
tentacool
tentacruel
geodude
graveler
golem
ponyta
rapidash
slowpoke
slowbro
magnemite
magneton
farfetchd
doduo
dodrio
seel
dewgong
grimer
muk
shellder
cloyster
gastly
haunter
gengar
onix
drowzee
hypno
krabby
kingler
voltorb
electrode
exeggcute
exeggutor
cubone
marowak
hitmonlee
hitmonchan
lickitung
koffing
weezing
rhyhorn
rhydon
chansey
tangela
kangaskhan
horsea
seadra
goldeen
seaking
staryu
starmie
mr-mime
scyther
jynx
electabuzz
magmar
pinsir
tauros
magikarp
gyarados
lapras
ditto
eevee
vaporeon
jolteon
flareon
porygon
omanyte
omastar
kabuto
kabutops
aerodactyl
snorlax
articuno
zapdos
moltres
dratini
dragonair
dragonite
mewtwo
mew";

/// The process-wide catalog built from the embedded label list.
static BUILTIN: LazyLock<Catalog> = LazyLock::new(|| Catalog::new(BUILTIN_LABELS));

/// Errors that can occur when querying the catalog
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The label is not part of the catalog
    #[error("label is not in the catalog")]
    NotFound,
}

/// A closed mapping from creature label to numeric identifier
///
/// The catalog supplies the universe of valid answer labels, a uniform
/// random draw over them, and the numeric identifier used to build image
/// references. Identifiers are 1-based line positions, so the list order
/// is meaningful and fixed.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Labels in identifier order
    labels: Vec<&'static str>,
    /// Reverse mapping from label to identifier
    numbers: HashMap<&'static str, u16>,
}

impl Catalog {
    /// Builds a catalog from a newline-separated label list
    ///
    /// Each non-empty line becomes a label whose identifier is its 1-based
    /// position in the list.
    pub fn new(data: &'static str) -> Self {
        let labels: Vec<&'static str> = data.lines().filter(|l| !l.is_empty()).collect();
        let numbers = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (*label, (i + 1) as u16))
            .collect();
        Self { labels, numbers }
    }

    /// Returns the built-in catalog shared by the whole process
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Returns all labels in identifier order
    pub fn labels(&self) -> &[&'static str] {
        &self.labels
    }

    /// Returns the number of labels in the catalog
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Checks whether the catalog contains no labels
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Looks up the numeric identifier for a label
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the label is not part of the catalog.
    /// Labels drawn from [`Catalog::labels`] always resolve; the error arm
    /// exists because answer labels also arrive from clients.
    pub fn identifier_for(&self, label: &str) -> Result<u16, Error> {
        self.numbers.get(label).copied().ok_or(Error::NotFound)
    }

    /// Draws a uniformly random label from the catalog
    ///
    /// # Panics
    ///
    /// Panics if the catalog is empty, which cannot happen for the built-in
    /// list.
    pub fn random_label(&self) -> &'static str {
        fastrand::choice(self.labels.iter().copied()).expect("catalog was empty")
    }

    /// Builds the displayable image reference for an identifier
    ///
    /// The identifier is zero-padded to three digits, matching the naming
    /// scheme of the picture assets ("025.png").
    pub fn image_reference(identifier: u16) -> String {
        format!("{identifier:03}.png")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_is_line_position() {
        let catalog = Catalog::new("ash\nbirch\ncedar");
        assert_eq!(catalog.identifier_for("ash"), Ok(1));
        assert_eq!(catalog.identifier_for("birch"), Ok(2));
        assert_eq!(catalog.identifier_for("cedar"), Ok(3));
    }

    #[test]
    fn test_identifier_not_found() {
        let catalog = Catalog::new("ash\nbirch");
        assert_eq!(catalog.identifier_for("willow"), Err(Error::NotFound));
    }

    #[test]
    fn test_builtin_catalog_shape() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 151);
        assert_eq!(catalog.identifier_for("bulbasaur"), Ok(1));
        assert_eq!(catalog.identifier_for("pikachu"), Ok(25));
        assert_eq!(catalog.identifier_for("mew"), Ok(151));
    }

    #[test]
    fn test_builtin_labels_are_distinct() {
        let catalog = Catalog::builtin();
        let unique: std::collections::HashSet<_> = catalog.labels().iter().collect();
        assert_eq!(unique.len(), catalog.len());
    }

    #[test]
    fn test_random_label_is_member() {
        let catalog = Catalog::new("ash\nbirch\ncedar");
        for _ in 0..50 {
            let label = catalog.random_label();
            assert!(catalog.identifier_for(label).is_ok());
        }
    }

    #[test]
    fn test_image_reference_zero_pads() {
        assert_eq!(Catalog::image_reference(7), "007.png");
        assert_eq!(Catalog::image_reference(25), "025.png");
        assert_eq!(Catalog::image_reference(151), "151.png");
    }

    #[test]
    fn test_empty_lines_are_skipped() {
        let catalog = Catalog::new("ash\n\nbirch\n");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.identifier_for("birch"), Ok(2));
    }
}
