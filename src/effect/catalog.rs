//! Static content tables: sound pools, message pools, block tables and particles.
//!
//! Pure data. Effects pick from these with the context rng; configuration may
//! override the message pools per effect.

use crate::world::Realm;

// ============================================================================
// Sounds
// ============================================================================

/// Step sounds played by phantom footsteps when not cloning the ground.
pub const STEP_SOUNDS: &[&str] = &[
    "block.wood.step",
    "block.stone.step",
    "block.gravel.step",
    "block.mud.step",
    "block.snow.step",
    "block.metal.step",
    "block.ladder.step",
    "block.wool.step",
    "block.scaffolding.step",
    "block.netherrack.step",
    "block.soul_sand.step",
    "block.soul_soil.step",
    "block.nylium.step",
    "block.basalt.step",
    "block.nether_bricks.step",
    "block.nether_ore.step",
    "block.wart_block.step",
    "block.glass.step",
    "block.bone_block.step",
];

/// Fallback step sound.
pub const DEFAULT_STEP_SOUND: &str = "block.stone.step";

/// Step sound matching the material a figure stands on.
#[must_use]
pub fn step_sound_for(material: Option<&str>) -> &'static str {
    match material.unwrap_or_default() {
        "grass_block" | "tall_grass" | "fern" => "block.grass.step",
        "stone" | "cobblestone" | "andesite" | "diorite" | "granite" => DEFAULT_STEP_SOUND,
        m if m.ends_with("_planks") || m.ends_with("_log") => "block.wood.step",
        "sand" | "red_sand" => "block.sand.step",
        "gravel" => "block.gravel.step",
        "snow_block" | "snow" => "block.snow.step",
        "glass" | "glass_pane" => "block.glass.step",
        _ => DEFAULT_STEP_SOUND,
    }
}

/// Creatures you would expect on the surface.
pub const SURFACE_SOUNDS: &[&str] = &[
    "entity.villager.ambient",
    "entity.cow.ambient",
    "entity.sheep.ambient",
    "entity.pig.ambient",
    "entity.chicken.ambient",
    "entity.wandering_trader.ambient",
    "entity.fox.ambient",
    "entity.wolf.ambient",
];

/// Cave ambience.
pub const CAVE_SOUNDS: &[&str] = &[
    "ambient.cave",
    "entity.bat.loop",
    "block.gravel.step",
    "entity.silverfish.ambient",
];

/// Undead, only plausible at night.
pub const UNDEAD_SOUNDS: &[&str] = &[
    "entity.zombie.ambient",
    "entity.skeleton.ambient",
    "entity.stray.ambient",
    "entity.husk.ambient",
    "entity.zombie_villager.ambient",
];

/// Hostile creatures.
pub const HOSTILE_SOUNDS: &[&str] = &[
    "entity.spider.ambient",
    "entity.creeper.primed",
    "entity.enderman.ambient",
];

/// First hostile realm.
pub const NETHER_SOUNDS: &[&str] = &[
    "ambient.nether_wastes.loop",
    "ambient.crimson_forest.loop",
    "ambient.warped_forest.loop",
    "ambient.soul_sand_valley.loop",
    "ambient.basalt_deltas.loop",
    "entity.ghast.ambient",
    "entity.blaze.ambient",
    "entity.zombified_piglin.ambient",
    "entity.hoglin.ambient",
    "entity.strider.ambient",
    "entity.magma_cube.squish",
];

/// Second hostile realm.
pub const END_SOUNDS: &[&str] = &[
    "entity.enderman.ambient",
    "entity.enderman.stare",
    "entity.enderman.teleport",
    "entity.shulker.ambient",
];

/// Glass breaking.
pub const GLASS_BREAK_SOUND: &str = "block.glass.break";

/// Subtle sounds a stalking figure makes.
pub const STALKER_SOUNDS: &[&str] = &["entity.player.hurt", "block.gravel.step"];

/// Pools that do not belong where the listener is.
///
/// Underground overworld listeners hear the surface or a hostile realm;
/// surface listeners hear caves, monsters or a hostile realm (undead only at
/// night); listeners in a hostile realm hear somewhere else entirely.
#[must_use]
pub fn misplaced_pools(realm: Realm, underground: bool, night: bool) -> Vec<&'static [&'static str]> {
    match realm {
        Realm::Overworld if underground => vec![SURFACE_SOUNDS, NETHER_SOUNDS, END_SOUNDS],
        Realm::Overworld => {
            let mut pools = vec![CAVE_SOUNDS, HOSTILE_SOUNDS, NETHER_SOUNDS, END_SOUNDS];
            if night {
                pools.push(UNDEAD_SOUNDS);
            }
            pools
        }
        Realm::Nether => vec![SURFACE_SOUNDS, END_SOUNDS],
        Realm::End => vec![SURFACE_SOUNDS, NETHER_SOUNDS],
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Whispered chat lines.
pub const CHAT_MESSAGES: &[&str] = &[
    "I feel tired.",
    "Something is watching me...",
    "What was that?",
    "What was that noise?",
    "Huh..?",
    "It's getting colder...",
    "Footsteps..?",
    "It is reeking of death...",
    "Keep going",
];

/// Lines shown above the hotbar.
pub const ACTION_BAR_MESSAGES: &[&str] = &[
    "...*Cof Cof*...",
    "...Who are you?...",
    "...I don't know you...",
    "...Get out...",
    "...Leave...",
    "...Behind...",
    "...You...",
    "...I'm following...",
    "...Hehehe...",
];

// ============================================================================
// Blocks and items
// ============================================================================

/// Materials a block may briefly appear as.
#[must_use]
pub fn flicker_substitutes(material: &str) -> &'static [&'static str] {
    match material {
        "stone" => &["cobblestone", "mossy_cobblestone", "andesite"],
        "cobblestone" => &["stone", "mossy_cobblestone", "gravel"],
        "mossy_cobblestone" => &["cobblestone", "stone"],
        "dirt" => &["coarse_dirt", "gravel", "podzol"],
        "grass_block" => &["dirt", "mycelium", "podzol"],
        "sand" => &["red_sand", "gravel"],
        "gravel" => &["sand", "clay"],
        "oak_log" => &["spruce_log", "dark_oak_log"],
        "spruce_log" => &["oak_log", "birch_log"],
        "oak_planks" => &["spruce_planks", "dark_oak_planks"],
        "stone_bricks" => &["mossy_stone_bricks", "cracked_stone_bricks"],
        "mossy_stone_bricks" => &["stone_bricks", "infested_mossy_stone_bricks"],
        "cracked_stone_bricks" => &["stone_bricks", "infested_cracked_stone_bricks"],
        "torch" => &["redstone_torch"],
        "wall_torch" => &["redstone_wall_torch"],
        _ => &[],
    }
}

/// Whether `material` is any kind of glass.
#[must_use]
pub fn is_glass(material: &str) -> bool {
    material == "glass"
        || material == "tinted_glass"
        || material == "glass_pane"
        || material.ends_with("_stained_glass")
        || material.ends_with("_stained_glass_pane")
}

/// Open and close sounds of an interactable block, `None` for anything else.
#[must_use]
pub fn interaction_sounds(material: &str) -> Option<(&'static str, &'static str)> {
    let sounds = match material {
        "iron_door" => ("block.iron_door.open", "block.iron_door.close"),
        "iron_trapdoor" => ("block.iron_trapdoor.open", "block.iron_trapdoor.close"),
        "chest" | "trapped_chest" => ("block.chest.open", "block.chest.close"),
        "barrel" => ("block.barrel.open", "block.barrel.close"),
        "lever" => ("block.lever.click", "block.lever.click"),
        m if m.ends_with("_door") => ("block.wooden_door.open", "block.wooden_door.close"),
        m if m.ends_with("_trapdoor") => ("block.wooden_trapdoor.open", "block.wooden_trapdoor.close"),
        m if m.ends_with("_fence_gate") => ("block.fence_gate.open", "block.fence_gate.close"),
        m if m.ends_with("_button") => ("block.wooden_button.click_on", "block.wooden_button.click_off"),
        _ => return None,
    };
    Some(sounds)
}

/// Whether `material` is a door, trapdoor or fence gate a hand can open.
#[must_use]
pub fn is_openable(material: &str) -> bool {
    material != "iron_door"
        && material != "iron_trapdoor"
        && (material.ends_with("_door")
            || material.ends_with("_trapdoor")
            || material.ends_with("_fence_gate"))
}

/// Solid, unremarkable blocks that may briefly vanish.
pub const VANISHING_MATERIALS: &[&str] = &[
    "stone",
    "grass_block",
    "dirt",
    "cobblestone",
    "oak_log",
    "oak_planks",
    "bricks",
    "stone_bricks",
    "iron_ore",
    "coal_ore",
    "diamond_ore",
    "gold_ore",
    "redstone_ore",
    "emerald_ore",
    "lapis_ore",
    "netherrack",
    "end_stone",
    "obsidian",
    "cobbled_deepslate",
    "deepslate",
];

/// One block of a structure, relative to its base.
pub type BlueprintBlock = ((i32, i32, i32), &'static str);

/// Small structures that appear out of nowhere.
pub const STRUCTURE_BLUEPRINTS: &[&[BlueprintBlock]] = &[
    &[
        ((0, 0, 0), "obsidian"),
        ((0, 1, 0), "crying_obsidian"),
        ((0, 2, 0), "sculk"),
    ],
    &[
        ((0, 0, 0), "deepslate_bricks"),
        ((0, 1, 0), "cracked_deepslate_bricks"),
        ((1, 0, 0), "deepslate_bricks"),
        ((1, 1, 0), "mossy_cobblestone"),
    ],
    &[((0, 0, 0), "polished_blackstone"), ((0, 1, 0), "iron_door")],
    &[
        ((0, 0, 0), "blackstone"),
        ((2, 0, 0), "blackstone"),
        ((0, 1, 0), "blackstone"),
        ((2, 1, 0), "blackstone"),
        ((0, 2, 0), "deepslate"),
        ((2, 2, 0), "deepslate"),
        ((0, 3, 0), "deepslate"),
        ((1, 3, 0), "chiseled_deepslate"),
        ((2, 3, 0), "deepslate"),
    ],
    &[
        ((0, 0, 0), "bone_block"),
        ((0, 1, 0), "bone_block"),
        ((0, 2, 0), "skeleton_skull"),
        ((0, 3, 0), "bone_block"),
        ((0, 4, 0), "bone_block"),
    ],
    &[
        ((0, 0, 0), "sculk"),
        ((1, 0, 0), "soul_soil"),
        ((0, 0, 1), "mossy_cobblestone"),
        ((0, 1, 0), "sculk_vein"),
        ((1, 1, 0), "cracked_stone_bricks"),
        ((0, 1, 1), "cobweb"),
        ((1, 2, 0), "sculk_catalyst"),
    ],
    &[
        ((0, 0, 0), "black_concrete"),
        ((1, 1, 0), "iron_bars"),
        ((-1, 1, 0), "iron_bars"),
        ((0, 1, 1), "iron_bars"),
        ((0, 1, -1), "iron_bars"),
        ((1, 2, 0), "iron_bars"),
        ((-1, 2, 0), "iron_bars"),
        ((0, 2, 1), "iron_bars"),
        ((0, 2, -1), "iron_bars"),
        ((0, 1, 0), "wither_skeleton_skull"),
    ],
];

// ============================================================================
// Particles
// ============================================================================

/// Particle drifting at the edge of vision.
pub const PERIPHERAL_PARTICLE: &str = "smoke";

/// Particles that hang in one spot for a while.
pub const LINGERING_PARTICLES: &[&str] = &[
    "smoke",
    "campfire_signal_smoke",
    "soul",
    "crit",
    "enchanted_hit",
    "white_ash",
    "dragon_breath",
];

/// Sound of the listener being hurt.
pub const HURT_SOUND: &str = "entity.player.hurt";

/// Items a stalking figure may hold.
pub const STALKER_ITEMS: &[&str] = &[
    "stone_sword",
    "wooden_sword",
    "stone_pickaxe",
    "torch",
    "compass",
    "paper",
    "bone",
    "rotten_flesh",
];

/// Creature kinds that may be puppeted.
pub const PASSIVE_KINDS: &[&str] = &[
    "cow", "pig", "sheep", "chicken", "horse", "donkey", "llama", "rabbit", "goat", "mooshroom",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_sound_by_material() {
        assert_eq!(step_sound_for(Some("grass_block")), "block.grass.step");
        assert_eq!(step_sound_for(Some("spruce_planks")), "block.wood.step");
        assert_eq!(step_sound_for(Some("obsidian")), DEFAULT_STEP_SOUND);
        assert_eq!(step_sound_for(None), DEFAULT_STEP_SOUND);
    }

    #[test]
    fn undead_only_at_night_on_surface() {
        let day = misplaced_pools(Realm::Overworld, false, false);
        let night = misplaced_pools(Realm::Overworld, false, true);
        assert!(!day.contains(&UNDEAD_SOUNDS));
        assert!(night.contains(&UNDEAD_SOUNDS));
        assert!(!misplaced_pools(Realm::Nether, false, true).contains(&NETHER_SOUNDS));
    }

    #[test]
    fn glass_variants() {
        assert!(is_glass("red_stained_glass_pane"));
        assert!(is_glass("glass"));
        assert!(!is_glass("glass_bottle"));
    }

    #[test]
    fn interactable_blocks_have_sounds() {
        assert_eq!(
            interaction_sounds("spruce_door"),
            Some(("block.wooden_door.open", "block.wooden_door.close"))
        );
        assert_eq!(interaction_sounds("iron_door").map(|s| s.0), Some("block.iron_door.open"));
        assert!(interaction_sounds("stone").is_none());
    }

    #[test]
    fn only_hand_operated_blocks_open() {
        assert!(is_openable("oak_door"));
        assert!(is_openable("birch_fence_gate"));
        assert!(!is_openable("iron_door"));
        assert!(!is_openable("chest"));
    }

    #[test]
    fn blueprints_stand_on_their_base() {
        for blueprint in STRUCTURE_BLUEPRINTS {
            assert!(blueprint.iter().any(|((_, y, _), _)| *y == 0));
            assert!(blueprint.iter().all(|((_, y, _), _)| *y >= 0));
        }
    }

    #[test]
    fn unmapped_blocks_have_no_substitutes() {
        assert!(flicker_substitutes("bedrock").is_empty());
        assert_eq!(flicker_substitutes("torch"), &["redstone_torch"]);
    }
}
