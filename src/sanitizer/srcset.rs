//! `srcset` attribute parsing.

use std::fmt;

/// One `srcset` entry: an image URL and an optional width (`640w`) or pixel
/// density (`2x`) descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub image_url: String,
    pub descriptor: Option<String>,
}

impl fmt::Display for ImageCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.descriptor {
            Some(descriptor) => write!(f, "{} {}", self.image_url, descriptor),
            None => f.write_str(&self.image_url),
        }
    }
}

/// An ordered candidate list. Displays back in `srcset` syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCandidates(pub Vec<ImageCandidate>);

impl ImageCandidates {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageCandidate> {
        self.0.iter()
    }
}

impl fmt::Display for ImageCandidates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, candidate) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{candidate}")?;
        }
        Ok(())
    }
}

impl FromIterator<ImageCandidate> for ImageCandidates {
    fn from_iter<I: IntoIterator<Item = ImageCandidate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ImageCandidates {
    type Item = ImageCandidate;
    type IntoIter = std::vec::IntoIter<ImageCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Parses a `srcset` value.
///
/// Candidates are separated by commas; a URL may itself contain commas as
/// long as it does not end with one. Candidates with more than one
/// descriptor, or a descriptor that is not `<number>w` / `<number>x`, are
/// skipped.
pub fn parse_srcset(value: &str) -> ImageCandidates {
    let mut candidates = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let raw_url = &rest[..url_end];
        rest = &rest[url_end..];

        let image_url = raw_url.trim_end_matches(',');
        if image_url.len() != raw_url.len() {
            if !image_url.is_empty() {
                candidates.push(ImageCandidate {
                    image_url: image_url.to_owned(),
                    descriptor: None,
                });
            }
            continue;
        }

        let descriptors_end = rest.find(',').unwrap_or(rest.len());
        let descriptors: Vec<&str> = rest[..descriptors_end].split_whitespace().collect();
        rest = &rest[descriptors_end..];

        match descriptors.as_slice() {
            [] => candidates.push(ImageCandidate {
                image_url: image_url.to_owned(),
                descriptor: None,
            }),
            [descriptor] if is_valid_descriptor(descriptor) => candidates.push(ImageCandidate {
                image_url: image_url.to_owned(),
                descriptor: Some((*descriptor).to_owned()),
            }),
            _ => {
                tracing::trace!(url = %image_url, "Skipping srcset candidate with invalid descriptor");
            }
        }
    }

    ImageCandidates(candidates)
}

fn is_valid_descriptor(value: &str) -> bool {
    let Some(number) = value.strip_suffix('w').or_else(|| value.strip_suffix('x')) else {
        return false;
    };
    !number.is_empty() && number.parse::<f32>().is_ok_and(|n| n.is_finite() && n >= 0.0)
}
