//! Styles listing command

use toonshift_weights::{Style, WeightCache, ASSET_HOST};

pub fn run(cache: &WeightCache) {
    println!("Pretrained styles (host: {ASSET_HOST})");
    println!("Cache: {}\n", cache.dir().display());

    for style in Style::ALL {
        let cached = cache.dir().join(style.asset_filename()).is_file();
        let marker = if cached { "cached" } else { "not cached" };
        println!("  {:<10} {:<26} [{}]", style, style.asset_filename(), marker);
    }
}
