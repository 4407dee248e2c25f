//! Requested output combinations.
//!
//! Surface outputs are requested as a target space plus a compact tag,
//! e.g. `("onavg-ico32", "1step_pial_area")`: resampling strategy,
//! projection surface, and vertex resampling method joined by
//! underscores. The decoder rejects malformed tags instead of guessing.

use anyhow::{bail, Result};

/// One decoded (space, strategy, projection, method) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    pub space: String,
    pub one_step: bool,
    pub projection: String,
    pub method: String,
}

impl Combination {
    /// Decode a `"1step_pial_area"`-style tag for a target space.
    pub fn decode(space: &str, tag: &str) -> Result<Self> {
        let mut parts = tag.splitn(2, '_');
        let step = parts.next().unwrap_or("");
        let rest = match parts.next() {
            Some(rest) => rest,
            None => bail!("Malformed combination tag {tag:?}: expected step_projection_method"),
        };
        let one_step = match step {
            "1step" => true,
            "2step" => false,
            other => bail!("Unknown resampling step {other:?} in tag {tag:?}"),
        };
        let (projection, method) = match rest.rsplit_once('_') {
            Some((projection, method)) if !projection.is_empty() && !method.is_empty() => {
                (projection, method)
            }
            _ => bail!("Malformed combination tag {tag:?}: expected step_projection_method"),
        };
        Ok(Self {
            space: space.to_string(),
            one_step,
            projection: projection.to_string(),
            method: method.to_string(),
        })
    }

    /// The tag this combination was decoded from.
    pub fn tag(&self) -> String {
        format!(
            "{}_{}_{}",
            if self.one_step { "1step" } else { "2step" },
            self.projection,
            self.method
        )
    }
}

/// Expand a space label into its full template sphere name.
///
/// `fsavg-X` maps to `fsaverage_X`, `onavg-X` to the versioned on-avg
/// template name; anything else passes through unchanged.
pub fn sphere_name(space: &str) -> String {
    match space.split_once('-') {
        Some(("fsavg", rest)) => format!("fsaverage_{rest}"),
        Some(("onavg", rest)) => format!("on-avg-1031-final_{rest}"),
        _ => space.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_step_tags() {
        let c = Combination::decode("onavg-ico32", "1step_pial_area").unwrap();
        assert_eq!(c.space, "onavg-ico32");
        assert!(c.one_step);
        assert_eq!(c.projection, "pial");
        assert_eq!(c.method, "area");
        assert_eq!(c.tag(), "1step_pial_area");
    }

    #[test]
    fn decodes_two_step_tags_with_compound_projection() {
        let c = Combination::decode("fsavg-ico64", "2step_mid_thickness_overlap").unwrap();
        assert!(!c.one_step);
        assert_eq!(c.projection, "mid_thickness");
        assert_eq!(c.method, "overlap");
    }

    #[test]
    fn rejects_malformed_tags() {
        assert!(Combination::decode("x", "3step_pial_area").is_err());
        assert!(Combination::decode("x", "1step").is_err());
        assert!(Combination::decode("x", "1step_pial").is_err());
    }

    #[test]
    fn sphere_names_expand_known_prefixes() {
        assert_eq!(sphere_name("fsavg-ico32"), "fsaverage_ico32");
        assert_eq!(sphere_name("onavg-ico32"), "on-avg-1031-final_ico32");
        assert_eq!(sphere_name("native"), "native");
    }
}
