use crate::structured::Shot;

pub const SHOT_CSV_HEADER: [&str; 5] = [
    "id",
    "action",
    "camera_movement",
    "lighting_atmosphere",
    "midjourney_prompt",
];

/// Renders a shot list as RFC 4180 CSV with a header row and CRLF line ends.
pub fn shots_to_csv(shots: &[Shot]) -> String {
    let mut out = String::new();
    push_row(&mut out, SHOT_CSV_HEADER.iter().copied());
    for shot in shots {
        push_row(
            &mut out,
            [
                shot.id.as_str(),
                shot.action.as_str(),
                shot.camera_movement.as_str(),
                shot.lighting_atmosphere.as_str(),
                shot.midjourney_prompt.as_str(),
            ],
        );
    }
    out
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
    if !field.contains([',', '"', '\n', '\r']) {
        out.push_str(field);
        return;
    }
    out.push('"');
    for ch in field.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}
