use serde_json::Value;

use super::{FieldError, WireField};

// Tabla CSS3 hex -> nombre. Donde CSS3 define dos nombres para un mismo valor
// queda uno solo: cyan (no aqua), magenta (no fuchsia) y la familia "gray".
const CSS3_HEX_TO_NAME: &[(&str, &str)] = &[
    ("#f0f8ff", "aliceblue"),
    ("#faebd7", "antiquewhite"),
    ("#7fffd4", "aquamarine"),
    ("#f0ffff", "azure"),
    ("#f5f5dc", "beige"),
    ("#ffe4c4", "bisque"),
    ("#000000", "black"),
    ("#ffebcd", "blanchedalmond"),
    ("#0000ff", "blue"),
    ("#8a2be2", "blueviolet"),
    ("#a52a2a", "brown"),
    ("#deb887", "burlywood"),
    ("#5f9ea0", "cadetblue"),
    ("#7fff00", "chartreuse"),
    ("#d2691e", "chocolate"),
    ("#ff7f50", "coral"),
    ("#6495ed", "cornflowerblue"),
    ("#fff8dc", "cornsilk"),
    ("#dc143c", "crimson"),
    ("#00ffff", "cyan"),
    ("#00008b", "darkblue"),
    ("#008b8b", "darkcyan"),
    ("#b8860b", "darkgoldenrod"),
    ("#a9a9a9", "darkgray"),
    ("#006400", "darkgreen"),
    ("#bdb76b", "darkkhaki"),
    ("#8b008b", "darkmagenta"),
    ("#556b2f", "darkolivegreen"),
    ("#ff8c00", "darkorange"),
    ("#9932cc", "darkorchid"),
    ("#8b0000", "darkred"),
    ("#e9967a", "darksalmon"),
    ("#8fbc8f", "darkseagreen"),
    ("#483d8b", "darkslateblue"),
    ("#2f4f4f", "darkslategray"),
    ("#00ced1", "darkturquoise"),
    ("#9400d3", "darkviolet"),
    ("#ff1493", "deeppink"),
    ("#00bfff", "deepskyblue"),
    ("#696969", "dimgray"),
    ("#1e90ff", "dodgerblue"),
    ("#b22222", "firebrick"),
    ("#fffaf0", "floralwhite"),
    ("#228b22", "forestgreen"),
    ("#dcdcdc", "gainsboro"),
    ("#f8f8ff", "ghostwhite"),
    ("#ffd700", "gold"),
    ("#daa520", "goldenrod"),
    ("#808080", "gray"),
    ("#008000", "green"),
    ("#adff2f", "greenyellow"),
    ("#f0fff0", "honeydew"),
    ("#ff69b4", "hotpink"),
    ("#cd5c5c", "indianred"),
    ("#4b0082", "indigo"),
    ("#fffff0", "ivory"),
    ("#f0e68c", "khaki"),
    ("#e6e6fa", "lavender"),
    ("#fff0f5", "lavenderblush"),
    ("#7cfc00", "lawngreen"),
    ("#fffacd", "lemonchiffon"),
    ("#add8e6", "lightblue"),
    ("#f08080", "lightcoral"),
    ("#e0ffff", "lightcyan"),
    ("#fafad2", "lightgoldenrodyellow"),
    ("#d3d3d3", "lightgray"),
    ("#90ee90", "lightgreen"),
    ("#ffb6c1", "lightpink"),
    ("#ffa07a", "lightsalmon"),
    ("#20b2aa", "lightseagreen"),
    ("#87cefa", "lightskyblue"),
    ("#778899", "lightslategray"),
    ("#b0c4de", "lightsteelblue"),
    ("#ffffe0", "lightyellow"),
    ("#00ff00", "lime"),
    ("#32cd32", "limegreen"),
    ("#faf0e6", "linen"),
    ("#ff00ff", "magenta"),
    ("#800000", "maroon"),
    ("#66cdaa", "mediumaquamarine"),
    ("#0000cd", "mediumblue"),
    ("#ba55d3", "mediumorchid"),
    ("#9370db", "mediumpurple"),
    ("#3cb371", "mediumseagreen"),
    ("#7b68ee", "mediumslateblue"),
    ("#00fa9a", "mediumspringgreen"),
    ("#48d1cc", "mediumturquoise"),
    ("#c71585", "mediumvioletred"),
    ("#191970", "midnightblue"),
    ("#f5fffa", "mintcream"),
    ("#ffe4e1", "mistyrose"),
    ("#ffe4b5", "moccasin"),
    ("#ffdead", "navajowhite"),
    ("#000080", "navy"),
    ("#fdf5e6", "oldlace"),
    ("#808000", "olive"),
    ("#6b8e23", "olivedrab"),
    ("#ffa500", "orange"),
    ("#ff4500", "orangered"),
    ("#da70d6", "orchid"),
    ("#eee8aa", "palegoldenrod"),
    ("#98fb98", "palegreen"),
    ("#afeeee", "paleturquoise"),
    ("#db7093", "palevioletred"),
    ("#ffefd5", "papayawhip"),
    ("#ffdab9", "peachpuff"),
    ("#cd853f", "peru"),
    ("#ffc0cb", "pink"),
    ("#dda0dd", "plum"),
    ("#b0e0e6", "powderblue"),
    ("#800080", "purple"),
    ("#ff0000", "red"),
    ("#bc8f8f", "rosybrown"),
    ("#4169e1", "royalblue"),
    ("#8b4513", "saddlebrown"),
    ("#fa8072", "salmon"),
    ("#f4a460", "sandybrown"),
    ("#2e8b57", "seagreen"),
    ("#fff5ee", "seashell"),
    ("#a0522d", "sienna"),
    ("#c0c0c0", "silver"),
    ("#87ceeb", "skyblue"),
    ("#6a5acd", "slateblue"),
    ("#708090", "slategray"),
    ("#fffafa", "snow"),
    ("#00ff7f", "springgreen"),
    ("#4682b4", "steelblue"),
    ("#d2b48c", "tan"),
    ("#008080", "teal"),
    ("#d8bfd8", "thistle"),
    ("#ff6347", "tomato"),
    ("#40e0d0", "turquoise"),
    ("#ee82ee", "violet"),
    ("#f5deb3", "wheat"),
    ("#ffffff", "white"),
    ("#f5f5f5", "whitesmoke"),
    ("#ffff00", "yellow"),
    ("#9acd32", "yellowgreen"),
];

/// Lleva `#abc` / `#AABBCC` a la forma `#aabbcc`. `None` si no es un hex válido.
pub fn normalize_hex(input: &str) -> Option<String> {
    let digits = input.strip_prefix('#')?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let digits = digits.to_ascii_lowercase();
    match digits.len() {
        3 => Some(digits.chars().fold(String::from("#"), |mut acc, c| {
            acc.push(c);
            acc.push(c);
            acc
        })),
        6 => Some(format!("#{digits}")),
        _ => None,
    }
}

pub fn hex_to_name(hex: &str) -> Option<&'static str> {
    let normalized = normalize_hex(hex)?;
    CSS3_HEX_TO_NAME
        .iter()
        .find(|(code, _)| *code == normalized)
        .map(|(_, name)| *name)
}

/// El registro guarda el nombre del color; el cliente envía el código hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexColorField;

impl WireField for HexColorField {
    type Stored = str;
    type Wire = String;
    type Internal = String;

    fn to_representation(&self, value: &str) -> String {
        value.to_string()
    }

    fn to_internal_value(&self, data: &Value) -> Result<String, FieldError> {
        data.as_str()
            .and_then(hex_to_name)
            .map(str::to_string)
            .ok_or(FieldError::UnknownColor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_hex_codes_resolve_to_names() {
        let field = HexColorField;

        assert_eq!(field.to_internal_value(&json!("#000000")).unwrap(), "black");
        assert_eq!(field.to_internal_value(&json!("#FFFFFF")).unwrap(), "white");
        assert_eq!(field.to_internal_value(&json!("#f00")).unwrap(), "red");
        assert_eq!(field.to_internal_value(&json!("#00ffff")).unwrap(), "cyan");
        assert_eq!(field.to_internal_value(&json!("#ff00ff")).unwrap(), "magenta");
        assert_eq!(field.to_internal_value(&json!("#808080")).unwrap(), "gray");
    }

    #[test]
    fn every_table_entry_round_trips_through_the_field() {
        let field = HexColorField;
        for (hex, name) in CSS3_HEX_TO_NAME {
            assert_eq!(field.to_internal_value(&json!(hex)).unwrap(), *name);
        }
    }

    #[test]
    fn unknown_or_malformed_values_are_rejected() {
        let field = HexColorField;

        for input in [json!("#123456"), json!("000000"), json!("#12"), json!("#gggggg"), json!(42)] {
            let err = field.to_internal_value(&input).unwrap_err();
            assert_eq!(err, FieldError::UnknownColor);
            assert_eq!(err.to_string(), "no name exists for this color.");
        }
    }

    #[test]
    fn representation_is_identity() {
        assert_eq!(
            HexColorField.to_representation("lightgoldenrodyellow"),
            "lightgoldenrodyellow"
        );
    }

    #[test]
    fn normalize_hex_expands_shorthand() {
        assert_eq!(normalize_hex("#AbC").as_deref(), Some("#aabbcc"));
        assert_eq!(normalize_hex("#a1b2c3").as_deref(), Some("#a1b2c3"));
        assert_eq!(normalize_hex("#a1b2c"), None);
    }
}
