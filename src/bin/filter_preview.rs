// Renders one test-pattern frame through every filter and framing so the
// colour transforms can be checked by eye without any media files.

use std::path::PathBuf;

use reel_composer::{
    config::FilterConfig,
    filters::{Filter, FilterSet, FilterTransform},
    timeline::AspectRatio,
    video::{canvas_size, FrameCompositor, MediaSource, SyntheticSource},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "filter_preview".to_string()));
    std::fs::create_dir_all(&out_dir)?;
    println!("🎬 Rendering filter previews into {}", out_dir.display());

    let source = SyntheticSource::new("pattern", 10.0, 320, 180);
    let metadata = source.metadata().ok_or("test pattern reported no metadata")?;
    let compositor = FrameCompositor::new(num_cpus::get())?;
    let frame = source.frame_at(2.5)?;

    let filter_config = FilterConfig {
        vhs_overlay: true,
        ..FilterConfig::default()
    };

    let looks: [(&str, FilterSet); 5] = [
        ("none", FilterSet::none()),
        ("grayscale", FilterSet::single(Filter::Grayscale)),
        ("night_vision", FilterSet::single(Filter::NightVision)),
        ("vhs", FilterSet::single(Filter::Vhs)),
        ("vhs_grayscale", FilterSet::new([Filter::Vhs, Filter::Grayscale])?),
    ];

    for (name, filters) in &looks {
        let transform = FilterTransform::for_set(filters, &filter_config);

        for aspect in [AspectRatio::Source, AspectRatio::Square, AspectRatio::Portrait] {
            let canvas = canvas_size(metadata.frame_size(), aspect);
            let output = compositor.compose(&frame, canvas, &transform, 0);

            let file = out_dir.join(format!("{}_{}.png", name, aspect.as_str().replace(':', "x")));
            output.save_png(&file)?;
            println!("   {} {} -> {} ({}x{})", name, aspect, file.display(), canvas.width, canvas.height);
        }
    }

    println!("🎉 Done");
    Ok(())
}
