//! The coordinate line we keep on every bound compass, and the colors that go with it.

use glam::IVec3;
use lodelink::{LoreLine, Marker, Rgb};

pub const COORDINATE_DOT: char = '●';
/// older builds wrote `Lodestone: x, y, z` instead of the dot
const LEGACY_PREFIX: &str = "Lodestone: ";
/// item model of compasses dyed by the colored compasses mod
pub const DYED_COMPASS_MODEL_PREFIX: &str = "tcc:dyed_compass/";

/// `● x, y, z` in the given color
pub fn coordinate_line(pos: IVec3, color: Rgb) -> LoreLine {
    LoreLine::colored(
        format!("{COORDINATE_DOT} {}, {}, {}", pos.x, pos.y, pos.z),
        color,
    )
}

/// The position written in a coordinate line, current or legacy. Lines that only look similar give `None`.
pub fn parse_coordinate_line(text: &str) -> Option<IVec3> {
    let coords = text
        .strip_prefix(COORDINATE_DOT)
        .and_then(|rest| rest.strip_prefix(' '))
        .or_else(|| text.strip_prefix(LEGACY_PREFIX))?;
    let mut parts = coords.split(", ").map(|part| part.parse::<i32>().ok());
    let pos = IVec3::new(parts.next()??, parts.next()??, parts.next()??);
    parts.next().is_none().then_some(pos)
}

pub fn is_coordinate_line(line: &LoreLine) -> bool {
    parse_coordinate_line(&line.text).is_some()
}

/// Puts `line` first and drops any coordinate line we wrote before. Other lore stays in order.
/// `None` if the lore would not change.
pub fn replace_coordinate_line(lore: &[LoreLine], line: LoreLine) -> Option<Vec<LoreLine>> {
    let mut replaced = Vec::with_capacity(lore.len() + 1);
    replaced.push(line);
    replaced.extend(lore.iter().filter(|l| !is_coordinate_line(l)).cloned());
    (replaced != lore).then_some(replaced)
}

/// The fixed color of a dye name, eg: `light_blue`
pub fn dye_color(name: &str) -> Option<Rgb> {
    let rgb = match name {
        "white" => 0xF9FFFE,
        "light_gray" => 0x9D9D97,
        "gray" => 0x474F52,
        "black" => 0x1D1D21,
        "brown" => 0x835432,
        "red" => 0xB02E26,
        "orange" => 0xF9801D,
        "yellow" => 0xFED83D,
        "lime" => 0x80C71F,
        "green" => 0x5E7C16,
        "cyan" => 0x169C9C,
        "light_blue" => 0x3AB3DA,
        "blue" => 0x3C44AA,
        "purple" => 0x8932B8,
        "magenta" => 0xC74EBD,
        "pink" => 0xF38BAA,
        _ => return None,
    };
    Some(Rgb::new(rgb))
}

/// The dye color of a dyed compass. Beats the registry color when present.
pub fn dye_override(marker: &Marker) -> Option<Rgb> {
    let model = marker.item_model.as_ref()?;
    let dye = model.strip_prefix(DYED_COMPASS_MODEL_PREFIX)?;
    dye_color(dye)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;
    use similar_asserts::assert_eq;

    #[rstest]
    fn formats_the_coordinates() {
        assert_eq!(
            coordinate_line(IVec3::new(10, -64, -3), Rgb::new(0xFF4444)),
            LoreLine::colored("● 10, -64, -3", Rgb::new(0xFF4444))
        );
    }

    #[rstest]
    fn replaces_old_lines_and_keeps_foreign_ones() {
        let lore = vec![
            LoreLine::plain("Lodestone: 1, 2, 3"),
            LoreLine::plain("Found in a shipwreck"),
            LoreLine::colored("● 1, 2, 3", Rgb::new(0x555555)),
        ];
        let line = coordinate_line(IVec3::new(1, 2, 3), Rgb::new(0x44FF44));
        assert_eq!(
            replace_coordinate_line(&lore, line.clone()),
            Some(vec![line.clone(), LoreLine::plain("Found in a shipwreck")])
        );
        let current = vec![line.clone(), LoreLine::plain("Found in a shipwreck")];
        assert_eq!(replace_coordinate_line(&current, line), None);
    }

    #[rstest]
    #[case("● 10, 64, 10", Some(IVec3::new(10, 64, 10)))]
    #[case("● -3, 0, 29999984", Some(IVec3::new(-3, 0, 29999984)))]
    #[case("Lodestone: 1, 2, 3", Some(IVec3::new(1, 2, 3)))]
    #[case("● Blessed by the wandering trader", None)]
    #[case("●10, 64, 10", None)]
    #[case("● 10, 64", None)]
    #[case("● 10, 64, 10, 4", None)]
    #[case("● 10, sixty, 10", None)]
    #[case("Lodestone: somewhere north", None)]
    fn only_well_formed_lines_are_ours(#[case] text: &str, #[case] expected: Option<IVec3>) {
        assert_eq!(parse_coordinate_line(text), expected);
    }

    #[rstest]
    fn foreign_lines_with_a_dot_survive() {
        let foreign = LoreLine::plain("● Signed by Bob");
        let line = coordinate_line(IVec3::new(1, 2, 3), Rgb::new(0x44FF44));
        assert_eq!(
            replace_coordinate_line(&[foreign.clone()], line.clone()),
            Some(vec![line, foreign])
        );
    }

    #[rstest]
    fn color_change_counts_as_a_change() {
        let pos = IVec3::new(1, 2, 3);
        let lore = vec![coordinate_line(pos, Rgb::new(0x44FF44))];
        assert_eq!(
            replace_coordinate_line(&lore, coordinate_line(pos, Rgb::new(0x555555))),
            Some(vec![coordinate_line(pos, Rgb::new(0x555555))])
        );
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some("minecraft:compass"), None)]
    #[case(Some("tcc:dyed_compass/light_blue"), Some(Rgb::new(0x3AB3DA)))]
    #[case(Some("tcc:dyed_compass/black"), Some(Rgb::new(0x1D1D21)))]
    #[case(Some("tcc:dyed_compass/chartreuse"), None)]
    fn dyed_compasses_override_the_color(#[case] model: Option<&str>, #[case] expected: Option<Rgb>) {
        let marker = Marker {
            item_model: model.map(Into::into),
            ..Default::default()
        };
        assert_eq!(dye_override(&marker), expected);
    }
}
