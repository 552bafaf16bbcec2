//! Software raster for the fingerprint scene.
//!
//! Draws the same fixed scene every time into an RGBA buffer: a two-stop
//! gradient, a filled block, and the banner text as a bit pattern. Host
//! traits (platform, core count) feed into the blend, the way GPU and font
//! stacks perturb a browser canvas.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const WIDTH: usize = 240;
pub const HEIGHT: usize = 60;

const BANNER: &str = "tracemark <canvas> 1.0";

/// Render the scene and return it as a data URL.
pub fn render(host_traits: &str) -> String {
    let pixels = draw(host_traits);
    format!(
        "data:image/x-rgba;width={};height={};base64,{}",
        WIDTH,
        HEIGHT,
        STANDARD.encode(pixels)
    )
}

fn draw(host_traits: &str) -> Vec<u8> {
    let bias = host_traits
        .bytes()
        .fold(0u8, |acc, b| acc.rotate_left(3) ^ b);
    let mut pixels = vec![0u8; WIDTH * HEIGHT * 4];

    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let t = (x * 255 / (WIDTH - 1)) as u8;
            put(&mut pixels, x, y, [t, 102, 255 - t, 255]);
        }
    }

    // Orange block behind the banner.
    for y in 8..28 {
        for x in 100..160 {
            blend(&mut pixels, x, y, [255, 102, 0, 255], 255);
        }
    }

    for (i, byte) in BANNER.bytes().enumerate() {
        let origin_x = 4 + i * 10;
        for bit in 0..8 {
            if byte & (1 << bit) == 0 {
                continue;
            }
            let x = origin_x + bit;
            for y in 30..44 {
                if x < WIDTH {
                    // Edge alpha varies with the host, like subpixel AA does.
                    let alpha = if bit == 0 || bit == 7 { 160 ^ (bias & 0x1f) } else { 230 };
                    blend(&mut pixels, x, y, [0, 102, 153, 255], alpha);
                }
            }
        }
    }

    pixels
}

fn put(pixels: &mut [u8], x: usize, y: usize, rgba: [u8; 4]) {
    let offset = (y * WIDTH + x) * 4;
    pixels[offset..offset + 4].copy_from_slice(&rgba);
}

fn blend(pixels: &mut [u8], x: usize, y: usize, rgba: [u8; 4], alpha: u8) {
    let offset = (y * WIDTH + x) * 4;
    let a = alpha as u16;
    for channel in 0..3 {
        let dst = pixels[offset + channel] as u16;
        let src = rgba[channel] as u16;
        pixels[offset + channel] = ((src * a + dst * (255 - a)) / 255) as u8;
    }
    pixels[offset + 3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render("linux x86_64 8"), render("linux x86_64 8"));
    }

    #[test]
    fn test_host_traits_change_output() {
        assert_ne!(render("linux x86_64 8"), render("macos aarch64 10"));
    }

    #[test]
    fn test_data_url_shape() {
        let url = render("");
        assert!(url.starts_with("data:image/x-rgba;width=240;height=60;base64,"));
        let payload = url.rsplit(',').next().unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap().len(), WIDTH * HEIGHT * 4);
    }
}
