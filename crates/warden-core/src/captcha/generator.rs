//! Default captcha generator: a distorted SVG text challenge.

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngExt;
use std::fmt::Write;

use warden_types::captcha_adapter::{CaptchaChallenge, CaptchaGenerator};

use crate::prelude::*;

/// No 0/O, 1/l/I look-alikes
const ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";
const WIDTH: u32 = 200;
const HEIGHT: u32 = 70;

#[derive(Debug, Clone)]
pub struct SvgCaptchaGenerator {
	length: usize,
	noise_lines: usize,
}

impl SvgCaptchaGenerator {
	pub fn new(length: usize) -> Self {
		Self { length: length.max(1), noise_lines: 6 }
	}

	fn random_phrase(&self) -> String {
		let mut rng = rand::rng();
		(0..self.length).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect()
	}

	fn render(&self, phrase: &str) -> Result<String, std::fmt::Error> {
		let mut rng = rand::rng();
		let mut svg = String::new();
		write!(
			svg,
			r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="100%" height="100%" fill="#f4f4f4"/>"##,
			w = WIDTH,
			h = HEIGHT
		)?;

		for _ in 0..self.noise_lines {
			write!(
				svg,
				r##"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="#999" stroke-width="1"/>"##,
				rng.random_range(0..WIDTH),
				rng.random_range(0..HEIGHT),
				rng.random_range(0..WIDTH),
				rng.random_range(0..HEIGHT)
			)?;
		}

		let step = (WIDTH - 20) / phrase.len().max(1) as u32;
		for (i, ch) in phrase.chars().enumerate() {
			let x = 14 + step * i as u32;
			let y = rng.random_range(38..56);
			let rotate = rng.random_range(-25i32..=25);
			write!(
				svg,
				r##"<text x="{x}" y="{y}" transform="rotate({rotate} {x} {y})" font-family="monospace" font-size="32" fill="#333">{ch}</text>"##
			)?;
		}
		svg.push_str("</svg>");
		Ok(svg)
	}
}

impl Default for SvgCaptchaGenerator {
	fn default() -> Self {
		Self::new(5)
	}
}

impl CaptchaGenerator for SvgCaptchaGenerator {
	fn create(&self) -> WdResult<CaptchaChallenge> {
		let phrase = self.random_phrase();
		let svg = self
			.render(&phrase)
			.map_err(|e| Error::Internal(format!("captcha rendering failed: {}", e)))?;

		Ok(CaptchaChallenge {
			phrase: phrase.into(),
			inline_image: format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg)).into(),
		})
	}
}


// vim: ts=4
