use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed encoder settings applied to every transcode
pub const VIDEO_CODEC: &str = "libx264";
pub const VIDEO_PRESET: &str = "medium";
pub const VIDEO_CRF: u8 = 23;
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "128k";

const DENOISE_FILTER: &str = "hqdn3d=1.5:1.5:6:6";
const SHARPEN_FILTER: &str = "unsharp=5:5:1.0:5:5:0.0";
const COLOR_FILTER: &str = "eq=contrast=1.1:saturation=1.2";

/// Target resolution tier
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[serde(rename = "none")]
    None,
    #[default]
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "2k")]
    Qhd2k,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl Resolution {
    /// Output width in pixels; `None` keeps the source size
    pub fn target_width(self) -> Option<u32> {
        match self {
            Resolution::None => None,
            Resolution::Hd1080 => Some(1920),
            Resolution::Qhd2k => Some(2560),
            Resolution::Uhd4k => Some(3840),
        }
    }

    /// Lanczos scale to the target width; `-2` keeps aspect ratio with an even height
    fn scale_filter(self) -> Option<String> {
        self.target_width()
            .map(|width| format!("scale={}:-2:flags=lanczos", width))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::None => "none",
            Resolution::Hd1080 => "1080p",
            Resolution::Qhd2k => "2k",
            Resolution::Uhd4k => "4k",
        };
        f.write_str(s)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Resolution::None),
            "1080p" => Ok(Resolution::Hd1080),
            "2k" => Ok(Resolution::Qhd2k),
            "4k" => Ok(Resolution::Uhd4k),
            other => Err(format!(
                "Unknown resolution '{}'. Expected one of: none, 1080p, 2k, 4k",
                other
            )),
        }
    }
}

/// Enhancement parameters for one transcode
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OptionSet {
    pub resolution: Resolution,
    pub denoise: bool,
    pub deblur: bool,
    pub color_correct: bool,
}

impl OptionSet {
    /// Build the ordered video filter list
    ///
    /// Order is fixed regardless of which options are enabled:
    /// denoise, sharpen, scale, color correction.
    pub fn video_filters(&self) -> Vec<String> {
        let mut filters = Vec::new();

        if self.denoise {
            filters.push(DENOISE_FILTER.to_string());
        }
        if self.deblur {
            filters.push(SHARPEN_FILTER.to_string());
        }
        if let Some(scale) = self.resolution.scale_filter() {
            filters.push(scale);
        }
        if self.color_correct {
            filters.push(COLOR_FILTER.to_string());
        }

        filters
    }

    /// Output arguments placed between the input and the output file
    pub fn output_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        let filters = self.video_filters();
        if !filters.is_empty() {
            args.push("-vf".to_string());
            args.push(filters.join(","));
        }

        args.extend([
            "-c:v".to_string(),
            VIDEO_CODEC.to_string(),
            "-preset".to_string(),
            VIDEO_PRESET.to_string(),
            "-crf".to_string(),
            VIDEO_CRF.to_string(),
            "-c:a".to_string(),
            AUDIO_CODEC.to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
        ]);

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_order_with_deblur_absent() {
        let options = OptionSet {
            resolution: Resolution::Uhd4k,
            denoise: true,
            deblur: false,
            color_correct: true,
        };

        assert_eq!(
            options.video_filters(),
            vec![
                "hqdn3d=1.5:1.5:6:6".to_string(),
                "scale=3840:-2:flags=lanczos".to_string(),
                "eq=contrast=1.1:saturation=1.2".to_string(),
            ]
        );
    }

    #[test]
    fn test_all_filters_in_fixed_order() {
        let options = OptionSet {
            resolution: Resolution::Qhd2k,
            denoise: true,
            deblur: true,
            color_correct: true,
        };

        let filters = options.video_filters();
        assert_eq!(filters.len(), 4);
        assert!(filters[0].starts_with("hqdn3d"));
        assert!(filters[1].starts_with("unsharp"));
        assert_eq!(filters[2], "scale=2560:-2:flags=lanczos");
        assert!(filters[3].starts_with("eq="));
    }

    #[test]
    fn test_no_filters_omits_vf_flag() {
        let options = OptionSet {
            resolution: Resolution::None,
            ..OptionSet::default()
        };

        assert!(options.video_filters().is_empty());
        let args = options.output_args();
        assert!(!args.contains(&"-vf".to_string()));
        assert_eq!(
            args,
            vec!["-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "128k"]
        );
    }

    #[test]
    fn test_filters_joined_into_single_vf_argument() {
        let options = OptionSet {
            resolution: Resolution::Hd1080,
            deblur: true,
            ..OptionSet::default()
        };

        let args = options.output_args();
        assert_eq!(args[0], "-vf");
        assert_eq!(args[1], "unsharp=5:5:1.0:5:5:0.0,scale=1920:-2:flags=lanczos");
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!("4k".parse::<Resolution>(), Ok(Resolution::Uhd4k));
        assert_eq!("none".parse::<Resolution>(), Ok(Resolution::None));
        assert!("8k".parse::<Resolution>().is_err());
        assert_eq!(Resolution::default(), Resolution::Hd1080);
        assert_eq!(Resolution::Qhd2k.to_string(), "2k");
    }
}
