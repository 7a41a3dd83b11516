use rand::seq::SliceRandom;

const ELEMENTS: &[&str] = &[
	"hydrogen", "helium", "lithium", "beryllium", "boron", "carbon", "nitrogen", "oxygen", "fluorine", "neon", "sodium",
	"magnesium", "aluminium", "silicon", "phosphorus", "sulfur", "chlorine", "argon", "potassium", "calcium", "scandium",
	"titanium", "vanadium", "chromium", "manganese", "iron", "cobalt", "nickel", "copper", "zinc", "gallium", "germanium",
	"arsenic", "selenium", "bromine", "krypton", "rubidium", "strontium", "yttrium", "zirconium", "niobium", "molybdenum",
	"technetium", "ruthenium", "rhodium", "palladium", "silver", "cadmium", "indium", "tin", "antimony", "tellurium",
	"iodine", "xenon", "caesium", "barium", "lanthanum", "cerium", "neodymium", "europium", "gadolinium", "terbium",
	"holmium", "erbium", "thulium", "ytterbium", "lutetium", "hafnium", "tantalum", "tungsten", "rhenium", "osmium",
	"iridium", "platinum", "gold", "mercury", "thallium", "lead", "bismuth", "polonium", "astatine", "radon", "francium",
	"radium", "actinium", "thorium", "uranium", "neptunium", "plutonium", "americium", "curium", "einsteinium",
];

const COLOURS: &[&str] = &[
	"red", "orange", "yellow", "green", "blue", "indigo", "violet", "crimson", "amber", "teal", "cyan", "magenta",
	"silver", "golden", "scarlet", "olive", "navy", "coral", "ivory", "plum",
];

const ANIMALS: &[&str] = &[
	"fox", "otter", "badger", "heron", "lynx", "wolf", "owl", "hare", "seal", "raven", "bison", "gecko", "koala", "lemur",
	"moose", "newt", "panda", "quail", "tapir", "yak",
];

fn pick(options: &'static [&'static str]) -> &'static str {
	options.choose(&mut rand::thread_rng()).copied().unwrap_or("unnamed")
}

/// Default name for a room created without one.
pub fn random_element() -> &'static str {
	pick(ELEMENTS)
}

/// Default display name, `<colour>-<animal>`.
pub fn random_display_name() -> String {
	format!("{}-{}", pick(COLOURS), pick(ANIMALS))
}
