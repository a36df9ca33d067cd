//! Worker name allocation: draws from a fixed pool, excluding any name
//! already referenced by a live agent bead in the rig.

const NAME_POOL: &[&str] = &[
    "Alpha", "Beta", "Gamma", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliett",
    "Kilo", "Lima", "Mike", "November", "Oscar", "Papa", "Quebec", "Romeo", "Sierra", "Tango",
    "Uniform", "Victor", "Whiskey", "Xray", "Yankee", "Zulu",
];

/// Pick the first pool name not already in `taken`. Once the pool is
/// exhausted, suffixes a cycle counter onto the pool so allocation never
/// fails outright (`Alpha2`, `Beta2`, ...).
#[must_use]
pub fn allocate(taken: &[String]) -> String {
    for name in NAME_POOL {
        if !taken.iter().any(|t| t == name) {
            return (*name).to_string();
        }
    }
    let mut cycle = 2u32;
    loop {
        for name in NAME_POOL {
            let candidate = format!("{name}{cycle}");
            if !taken.iter().any(|t| *t == candidate) {
                return candidate;
            }
        }
        cycle += 1;
    }
}
