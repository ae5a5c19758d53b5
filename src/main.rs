use lineardoc::{MwContextualizer, Segmenter, parse_with};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example usage: a paragraph with a citation right after a full stop
    let source = "<p>Hydrogen is a <a href=\"./Gas\">gas</a>.<sup typeof=\"mw:Extension/ref\">[1]</sup> \
                  It is the lightest element.</p>";

    let doc = parse_with(source, &MwContextualizer)?;
    println!("Items:\n{}\n", doc.dump_canonical());

    let segmented = Segmenter::for_language("en").segment(&doc)?;
    for segment in segmented.segments() {
        println!(
            "Segment {}: {:?}",
            segment.id,
            segmented.segment_text(segment)
        );
    }
    println!("\nRendered: {}", segmented.render()?);

    // Sentences without spaces between them
    let doc = parse_with("<p>我喜欢猫。它们很可爱！</p>", &MwContextualizer)?;
    let segmented = Segmenter::for_language("zh").segment(&doc)?;
    println!("Rendered: {}", segmented.render()?);
    Ok(())
}
