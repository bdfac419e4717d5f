//! Default avatars: a 5x5 horizontally mirrored grid rendered as SVG.

use sha2::{Digest, Sha256};

pub const CONTENT_TYPE: &str = "image/svg+xml";

const GRID: usize = 5;
const SIZE: usize = 200;
const CELL: usize = SIZE / GRID;

/// A fresh identicon for `name`. Two calls with the same name differ.
pub fn generate(name: &str) -> Vec<u8> {
    let nonce: [u8; 8] = rand::random();
    render(name, &hex::encode(nonce)).into_bytes()
}

/// Renders the identicon for a (name, nonce) pair.
pub fn render(name: &str, nonce: &str) -> String {
    let digest = Sha256::new()
        .chain_update(name.as_bytes())
        .chain_update(nonce.as_bytes())
        .finalize();

    let color = hex::encode(&digest[..3]);
    let mut cells = String::new();
    for row in 0..GRID {
        // Columns 0..=2 decide the pattern; 3 and 4 mirror 1 and 0.
        for col in 0..=GRID / 2 {
            if digest[3 + row * 3 + col] & 1 == 0 {
                continue;
            }
            for x in [col, GRID - 1 - col] {
                cells.push_str(&format!(
                    r#"<rect x="{}" y="{}" width="{CELL}" height="{CELL}"/>"#,
                    x * CELL,
                    row * CELL
                ));
                if x == GRID / 2 {
                    break;
                }
            }
        }
    }

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{SIZE}" height="{SIZE}" viewBox="0 0 {SIZE} {SIZE}"><rect width="{SIZE}" height="{SIZE}" fill="#f0f0f0"/><g fill="#{color}">{cells}</g></svg>"##
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(svg: &str) -> Vec<(usize, usize)> {
        svg.split(r#"<rect x=""#)
            .skip(1)
            .map(|s| {
                let mut parts = s.split('"');
                let x = parts.next().unwrap().parse::<usize>().unwrap() / CELL;
                let y = parts.nth(1).unwrap().parse::<usize>().unwrap() / CELL;
                (x, y)
            })
            .collect()
    }

    #[test]
    fn same_inputs_same_image() {
        assert_eq!(render("alice", "00ff"), render("alice", "00ff"));
        assert_ne!(render("alice", "00ff"), render("alice", "ff00"));
    }

    #[test]
    fn grid_is_mirrored() {
        let svg = render("bob", "1234");
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"width="200""#));

        let cells = filled(&svg);
        for &(x, y) in &cells {
            assert!(cells.contains(&(GRID - 1 - x, y)), "cell ({x},{y}) has no mirror");
        }
    }

    #[test]
    fn generated_avatars_use_a_nonce() {
        assert_ne!(generate("carol"), generate("carol"));
    }
}
