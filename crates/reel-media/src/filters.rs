//! FFmpeg filter expressions for scene motion, fades and audio mixing.

use reel_models::{Effect, MotionProfile, RenderConfig};

/// Oversampling factor applied before `zoompan` to avoid sub-pixel jitter.
const ZOOMPAN_OVERSAMPLE: u32 = 2;

/// Which fades a scene clip carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FadePlan {
    pub fade_in: bool,
    pub fade_out: bool,
}

impl FadePlan {
    pub fn both() -> Self {
        Self {
            fade_in: true,
            fade_out: true,
        }
    }
}

/// Scale and crop so the frame covers the target size.
pub fn filter_cover(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
        w = width,
        h = height
    )
}

/// `zoompan` filter for an effect over `frames` output frames.
///
/// Returns `None` for [`Effect::Static`]. The zoom and pan ramps run on
/// `on / frames` scaled by the profile speeds and clamp at 1.
pub fn filter_motion(effect: Effect, profile: &MotionProfile, frames: u64, render: &RenderConfig) -> Option<String> {
    let frames = frames.max(1);
    let zoom_ramp = format!("min(1,on/{}*{:.3})", frames, profile.zoom_speed);
    let pan_ramp = format!("min(1,on/{}*{:.3})", frames, profile.pan_speed);
    let extent = format!("{:.3}", profile.zoom_extent);
    let center_x = "(iw-iw/zoom)/2".to_string();
    let center_y = "(ih-ih/zoom)/2".to_string();

    let (zoom, x, y) = match effect {
        Effect::Static => return None,
        Effect::KenBurns => (
            format!("1+{}*{}", extent, zoom_ramp),
            format!("(iw-iw/zoom)*{}", pan_ramp),
            format!("(ih-ih/zoom)*{}", pan_ramp),
        ),
        Effect::ZoomIn => (format!("1+{}*{}", extent, zoom_ramp), center_x, center_y),
        Effect::ZoomOut => (format!("1+{}*(1-{})", extent, zoom_ramp), center_x, center_y),
        Effect::PanLeft => (
            format!("1+{}", extent),
            format!("(iw-iw/zoom)*(1-{})", pan_ramp),
            center_y,
        ),
        Effect::PanRight => (
            format!("1+{}", extent),
            format!("(iw-iw/zoom)*{}", pan_ramp),
            center_y,
        ),
    };

    Some(format!(
        "zoompan=z='{}':x='{}':y='{}':d=1:s={}:fps={}",
        zoom,
        x,
        y,
        render.size(),
        render.fps
    ))
}

/// Fade filters for a clip of `duration` seconds.
///
/// The fade length is clamped to half the clip so in and out never overlap.
pub fn filter_fades(plan: FadePlan, duration: f64, fade_seconds: f64) -> Vec<String> {
    let fade = fade_seconds.min(duration / 2.0);
    if fade <= 0.0 {
        return Vec::new();
    }

    let mut filters = Vec::new();
    if plan.fade_in {
        filters.push(format!("fade=t=in:st=0:d={:.3}", fade));
    }
    if plan.fade_out {
        filters.push(format!("fade=t=out:st={:.3}:d={:.3}", duration - fade, fade));
    }
    filters
}

/// Full video chain for a still image scene.
pub fn filter_still_scene(
    effect: Effect,
    profile: &MotionProfile,
    duration: f64,
    render: &RenderConfig,
    fades: FadePlan,
    fade_seconds: f64,
) -> String {
    let mut chain = Vec::new();

    match filter_motion(effect, profile, render.frame_count(duration), render) {
        Some(zoompan) => {
            chain.push(filter_cover(
                render.width * ZOOMPAN_OVERSAMPLE,
                render.height * ZOOMPAN_OVERSAMPLE,
            ));
            chain.push(zoompan);
        }
        None => chain.push(filter_cover(render.width, render.height)),
    }

    chain.push(format!("fps={}", render.fps));
    chain.extend(filter_fades(fades, duration, fade_seconds));
    chain.push("format=yuv420p".to_string());
    chain.join(",")
}

/// Video chain for an image-to-video motion clip.
pub fn filter_motion_clip(duration: f64, render: &RenderConfig, fades: FadePlan, fade_seconds: f64) -> String {
    let mut chain = vec![filter_cover(render.width, render.height), format!("fps={}", render.fps)];
    chain.extend(filter_fades(fades, duration, fade_seconds));
    chain.push("format=yuv420p".to_string());
    chain.join(",")
}

/// Pad narration with trailing silence up to the clip duration.
pub fn filter_narration(duration: f64, sample_rate: u32) -> String {
    format!(
        "aresample={},aformat=channel_layouts=stereo,apad,atrim=0:{:.3},asetpts=PTS-STARTPTS",
        sample_rate, duration
    )
}

/// Silent stereo source used for scenes without narration.
pub fn source_silence(sample_rate: u32) -> String {
    format!("anullsrc=r={}:cl=stereo", sample_rate)
}

/// Attenuate looped music, trim it to the timeline and add it to narration.
///
/// Expects the video+narration as input 0 and the looped music as input 1.
pub fn filter_music_mix(total_duration: f64, volume: f64, sample_rate: u32) -> String {
    format!(
        "[1:a]aresample={sr},aformat=channel_layouts=stereo,volume={vol:.3},atrim=0:{dur:.3},asetpts=PTS-STARTPTS[music];\
         [0:a][music]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[mixed]",
        sr = sample_rate,
        vol = volume,
        dur = total_duration
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::SpeedTier;

    #[test]
    fn test_static_has_no_zoompan() {
        let render = RenderConfig::default();
        let profile = SpeedTier::Medium.profile();
        assert!(filter_motion(Effect::Static, &profile, 72, &render).is_none());

        let chain = filter_still_scene(Effect::Static, &profile, 3.0, &render, FadePlan::both(), 0.5);
        assert!(!chain.contains("zoompan"));
        assert!(chain.starts_with("scale=1920:1080"));
    }

    #[test]
    fn test_ken_burns_zooms_and_pans() {
        let render = RenderConfig::default();
        let profile = SpeedTier::Slow.profile();
        let filter = filter_motion(Effect::KenBurns, &profile, 185, &render).unwrap();

        assert!(filter.contains("z='1+0.150*min(1,on/185*1.200)'"));
        assert!(filter.contains("x='(iw-iw/zoom)*min(1,on/185*1.000)'"));
        assert!(filter.contains("s=1920x1080"));
    }

    #[test]
    fn test_pans_only_translate_horizontally() {
        let render = RenderConfig::default();
        let profile = SpeedTier::Fast.profile();
        let left = filter_motion(Effect::PanLeft, &profile, 30, &render).unwrap();
        let right = filter_motion(Effect::PanRight, &profile, 30, &render).unwrap();

        assert!(left.contains("z='1+0.300'"));
        assert!(left.contains("(1-min(1,on/30*0.600))"));
        assert!(right.contains("y='(ih-ih/zoom)/2'"));
    }

    #[test]
    fn test_fades_clamped_to_half_clip() {
        let fades = filter_fades(FadePlan::both(), 0.6, 0.5);
        assert_eq!(fades, vec!["fade=t=in:st=0:d=0.300", "fade=t=out:st=0.300:d=0.300"]);

        let only_out = filter_fades(
            FadePlan {
                fade_in: false,
                fade_out: true,
            },
            3.0,
            0.5,
        );
        assert_eq!(only_out, vec!["fade=t=out:st=2.500:d=0.500"]);
    }

    #[test]
    fn test_music_mix_is_additive() {
        let filter = filter_music_mix(13.7, 0.3, 44100);
        assert!(filter.contains("volume=0.300"));
        assert!(filter.contains("atrim=0:13.700"));
        assert!(filter.contains("amix=inputs=2"));
        assert!(filter.contains("normalize=0"));
    }
}
