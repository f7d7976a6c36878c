//! End-to-end pipeline scenarios over synthetic worlds.

use std::fs;
use std::sync::Arc;

use crate::test::fixture::{asset_loader, region_file, stone_chunk_nbt, temp_dir};
use crate::{
    PixelRenderer, PixelRendererOpts, Renderer, WorldRenderOpts, WorldRenderResult,
};

fn render_stone_world(
    status: &str,
    timestamp: i32,
    opts: &WorldRenderOpts,
) -> (WorldRenderResult, std::path::PathBuf) {
    let src = temp_dir("world");
    let dst = temp_dir("tiles");

    fs::write(
        src.join("r.0.0.mca"),
        region_file(&[(0, 0, timestamp, stone_chunk_nbt(0, 0, status))]),
    )
    .unwrap();

    let pixel = Arc::new(
        PixelRenderer::new(PixelRendererOpts::default(), asset_loader()).unwrap(),
    );
    let renderer = Renderer::new(Box::new(Arc::clone(&pixel)));

    let result = renderer.render_world(&src, &dst, opts).unwrap();
    (result, dst)
}

#[test]
fn single_stone_chunk_renders_at_the_region_origin() {
    let (result, dst) = render_stone_world("minecraft:full", 1234, &WorldRenderOpts::default());

    assert_eq!(1, result.rendered_chunks);
    assert_eq!(Some(&1234), result.region_timestamps.get("r.0.0"));

    let img = image::open(dst.join("r.0.0.png")).unwrap().into_rgba8();
    assert_eq!((512, 512), img.dimensions());

    // the chunk fills the 16x16 top-left corner with the stone color...
    assert_eq!([100, 120, 140, 255], img.get_pixel(0, 0).0);
    assert_eq!([100, 120, 140, 255], img.get_pixel(15, 15).0);
    // ...and everything else stays transparent.
    assert_eq!([0, 0, 0, 0], img.get_pixel(16, 0).0);
    assert_eq!([0, 0, 0, 0], img.get_pixel(300, 300).0);
}

#[test]
fn unchanged_region_is_skipped_and_carries_its_timestamp() {
    let (first, _) = render_stone_world("minecraft:full", 555, &WorldRenderOpts::default());

    let opts = WorldRenderOpts {
        concurrency: 1,
        region_timestamps: first.region_timestamps,
    };
    let (second, dst) = render_stone_world("minecraft:full", 555, &opts);

    assert_eq!(0, second.rendered_chunks);
    assert_eq!(Some(&555), second.region_timestamps.get("r.0.0"));
    // skipped regions emit no image at all.
    assert!(!dst.join("r.0.0.png").exists());
}

#[test]
fn chunks_newer_than_the_previous_build_rerender() {
    let (first, _) = render_stone_world("minecraft:full", 100, &WorldRenderOpts::default());

    let opts = WorldRenderOpts {
        concurrency: 1,
        region_timestamps: first.region_timestamps,
    };
    let (second, dst) = render_stone_world("minecraft:full", 101, &opts);

    assert_eq!(1, second.rendered_chunks);
    assert_eq!(Some(&101), second.region_timestamps.get("r.0.0"));
    assert!(dst.join("r.0.0.png").exists());
}

#[test]
fn unfinished_chunks_are_filtered_by_status() {
    let (result, dst) = render_stone_world("minecraft:features", 42, &WorldRenderOpts::default());

    assert_eq!(0, result.rendered_chunks);
    // the region still had a newer timestamp, so it was scanned; with no
    // chunk drawn the recorded max is zero.
    assert_eq!(Some(&0), result.region_timestamps.get("r.0.0"));
    assert!(dst.join("r.0.0.png").exists());
}

#[test]
fn empty_region_files_are_skipped() {
    let src = temp_dir("world");
    let dst = temp_dir("tiles");

    fs::write(src.join("r.0.0.mca"), Vec::new()).unwrap();
    fs::write(
        src.join("r.1.0.mca"),
        region_file(&[(0, 0, 9, stone_chunk_nbt(32, 0, "minecraft:full"))]),
    )
    .unwrap();

    let pixel = Arc::new(
        PixelRenderer::new(PixelRendererOpts::default(), asset_loader()).unwrap(),
    );
    let renderer = Renderer::new(Box::new(pixel));

    let result = renderer
        .render_world(&src, &dst, &WorldRenderOpts::default())
        .unwrap();

    assert_eq!(1, result.rendered_chunks);
    assert!(!result.region_timestamps.contains_key("r.0.0"));
    assert!(result.region_timestamps.contains_key("r.1.0"));
}

#[test]
fn corrupt_chunks_abandon_their_region_only() {
    let src = temp_dir("world");
    let dst = temp_dir("tiles");

    fs::write(
        src.join("r.0.0.mca"),
        region_file(&[(0, 0, 7, b"this is not nbt".to_vec())]),
    )
    .unwrap();
    fs::write(
        src.join("r.1.0.mca"),
        region_file(&[(0, 0, 9, stone_chunk_nbt(32, 0, "minecraft:full"))]),
    )
    .unwrap();

    let pixel = Arc::new(
        PixelRenderer::new(PixelRendererOpts::default(), asset_loader()).unwrap(),
    );
    let renderer = Renderer::new(Box::new(pixel));

    let result = renderer
        .render_world(&src, &dst, &WorldRenderOpts::default())
        .unwrap();

    // the broken region produced nothing, the good one rendered.
    assert_eq!(1, result.rendered_chunks);
    assert!(!dst.join("r.0.0.png").exists());
    assert!(dst.join("r.1.0.png").exists());
    assert!(!result.region_timestamps.contains_key("r.0.0"));
}

#[test]
fn missing_block_states_are_reported_through_the_renderer() {
    let src = temp_dir("world");
    let dst = temp_dir("tiles");

    let mut nbt = stone_chunk_nbt(0, 0, "minecraft:full");
    // swap the block name for one the fixture archive cannot resolve.
    let needle = b"minecraft:stone";
    let pos = nbt
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap();
    nbt[pos..pos + needle.len()].copy_from_slice(b"minecraft:st0ne");

    fs::write(src.join("r.0.0.mca"), region_file(&[(0, 0, 1, nbt)])).unwrap();

    let pixel = Arc::new(
        PixelRenderer::new(PixelRendererOpts::default(), asset_loader()).unwrap(),
    );
    let renderer = Renderer::new(Box::new(Arc::clone(&pixel)));
    renderer
        .render_world(&src, &dst, &WorldRenderOpts::default())
        .unwrap();

    assert_eq!(vec!["minecraft:st0ne".to_owned()], pixel.missing_block_states());
}
