use std::fs;

use gifkit::{
    Block, Color, ColorTable, Encoder, EndCode, GifError, GifFile, HasParameters, Image,
    ImageDescriptor, Reader, RowOrder, ScreenDescriptor, Version,
};

fn palette(colors: usize) -> ColorTable {
    let rgb: Vec<u8> = (0..colors).flat_map(|i| [i as u8, i as u8, i as u8]).collect();
    ColorTable::from_rgb(&rgb).unwrap()
}

/// Walks the sub-block chain starting at `pos` and returns the lengths.
fn sub_block_lengths(data: &[u8], mut pos: usize) -> (Vec<usize>, usize) {
    let mut lengths = Vec::new();
    while data[pos] != 0 {
        lengths.push(data[pos] as usize);
        pos += 1 + data[pos] as usize;
    }
    (lengths, pos + 1)
}

#[test]
fn interlaced_rows_come_in_pass_order() {
    let mut desc = ImageDescriptor::new(0, 0, 3, 8);
    desc.interlaced = true;
    desc.color_table = Some(palette(8));
    let display: Vec<u8> = (0..8u8).flat_map(|row| [row; 3]).collect();

    let mut encoder = Encoder::new(Vec::new());
    encoder.set(RowOrder::Sequential);
    encoder.write_screen_desc(&ScreenDescriptor::new(3, 8)).unwrap();
    encoder.write_image(&desc, &display).unwrap();
    encoder.write_trailer().unwrap();
    let data = encoder.into_inner();

    let mut reader = Reader::new(&*data).unwrap();
    assert_eq!(reader.next_record().unwrap(), Block::Image);
    reader.read_image_desc().unwrap();
    let mut line = [0; 3];
    let mut order = Vec::new();
    for _ in 0..8 {
        let row = reader.read_line(&mut line).unwrap();
        assert_eq!(line, [row as u8; 3]);
        order.push(row);
    }
    assert_eq!(order, [0, 4, 2, 6, 1, 3, 5, 7]);
    assert!(matches!(reader.read_line(&mut line), Err(GifError::InvalidSequence(_))));
    assert_eq!(reader.next_record().unwrap(), Block::Trailer);

    // whole raster in stream order by default
    let mut reader = Reader::new(&*data).unwrap();
    reader.next_record().unwrap();
    reader.read_image_desc().unwrap();
    let stream = reader.read_raster().unwrap();
    assert_eq!(&stream[..6], [0, 0, 0, 4, 4, 4]);
}

#[test]
fn large_images_are_framed_in_full_sub_blocks() {
    let (width, height) = (320u16, 240u16);
    let mut seed = 17u32;
    let raster: Vec<u8> = (0..width as usize * height as usize)
        .map(|_| {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            (seed >> 16) as u8
        })
        .collect();
    let mut screen = ScreenDescriptor::new(width, height);
    screen.global_color_table = Some(palette(256));
    let mut file = GifFile::new(screen);
    file.push_image(Image::new(ImageDescriptor::new(0, 0, width, height), raster).unwrap());

    let data = file.spew(Vec::new()).unwrap();
    // header, screen, table, descriptor, code size
    let start = 13 + 768 + 10;
    assert_eq!(data[start], 8);
    let (lengths, end) = sub_block_lengths(&data, start + 1);
    assert!(lengths.len() > 100);
    assert!(lengths[..lengths.len() - 1].iter().all(|&n| n == 255));
    assert_eq!(&data[end..], [0x3B]);

    assert_eq!(GifFile::slurp(&*data).unwrap(), file);
}

#[test]
fn several_images_and_extensions() {
    let mut encoder = Encoder::new(Vec::new());
    let mut screen = ScreenDescriptor::new(4, 2);
    screen.global_color_table = Some(palette(4));
    encoder.write_screen_desc(&screen).unwrap();
    encoder.write_extension(&gifkit::ExtensionBlock::comment("first")).unwrap();
    encoder.write_image(&ImageDescriptor::new(0, 0, 4, 2), &[0, 1, 2, 3, 3, 2, 1, 0]).unwrap();
    let mut local = ImageDescriptor::new(1, 1, 2, 1);
    local.color_table = Some(palette(2));
    encoder.write_image(&local, &[1, 0]).unwrap();
    encoder.write_extension(&gifkit::ExtensionBlock::from_data(0x42, &[7; 300])).unwrap();
    encoder.write_trailer().unwrap();
    let data = encoder.into_inner();
    assert_eq!(&data[..6], b"GIF89a");

    let file = GifFile::slurp(&*data).unwrap();
    assert_eq!(file.images.len(), 2);
    assert_eq!(file.images[0].extensions[0].data(), b"first");
    assert!(file.images[1].extensions.is_empty());
    assert_eq!(file.images[1].descriptor.left, 1);
    assert_eq!(file.images[1].raster, [1, 0]);
    assert_eq!(file.trailing_extensions.len(), 1);
    assert_eq!(file.trailing_extensions[0].function, 0x42);
    assert_eq!(file.trailing_extensions[0].blocks.len(), 2);
    assert_eq!(file.spew(Vec::new()).unwrap(), data);
}

#[test]
fn raw_image_data_is_copied_unchanged() {
    let data = fs::read("tests/samples/sample_2.gif").unwrap();
    let mut reader = Reader::new(&*data).unwrap();
    let mut encoder = Encoder::new(Vec::new());
    encoder.set(reader.version());
    encoder.write_screen_desc(reader.screen()).unwrap();
    loop {
        match reader.next_record().unwrap() {
            Block::Extension => encoder.write_extension(&reader.read_extension().unwrap()).unwrap(),
            Block::Image => {
                let desc = reader.read_image_desc().unwrap().clone();
                let (code_size, blocks) = reader.read_code_blocks().unwrap();
                encoder.write_raw_image(&desc, code_size, &blocks).unwrap();
            }
            Block::Trailer => break,
        }
    }
    encoder.write_trailer().unwrap();
    assert_eq!(encoder.into_inner(), data);
}

#[test]
fn malformed_streams() {
    let data = fs::read("tests/samples/sample_1.gif").unwrap();

    assert!(matches!(GifFile::slurp(&b"GIF88a"[..]), Err(GifError::NotAGifFile)));
    assert!(matches!(GifFile::slurp(&b""[..]), Err(GifError::UnexpectedEndOfData)));

    for len in [6, 13, 20, 30, 40, 50, data.len() - 1] {
        assert!(
            matches!(GifFile::slurp(&data[..len]), Err(GifError::UnexpectedEndOfData)),
            "truncated at {}",
            len
        );
    }

    // LZW minimum code size of 0
    let mut bad = data.clone();
    bad[0x2B] = 0;
    assert!(matches!(GifFile::slurp(&*bad), Err(GifError::CorruptData(_))));

    // unknown record type after the image
    let mut bad = data.clone();
    let last = bad.len() - 1;
    bad[last] = 0x00;
    bad.push(0x3B);
    assert!(matches!(GifFile::slurp(&*bad), Err(GifError::CorruptData(_))));

    // bytes after the trailer are ignored
    let mut extra = data.clone();
    extra.extend_from_slice(b"junk");
    assert_eq!(GifFile::slurp(&*extra).unwrap(), GifFile::slurp(&*data).unwrap());
}

#[test]
fn missing_end_code_can_be_tolerated() {
    // 4x1 image: clear(4) 1 1 1 in 3 bits, 1 in 4 bits, no end code
    let mut data = b"GIF87a\x04\x00\x01\x00\x80\x00\x00".to_vec();
    data.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
    data.extend_from_slice(&[0x2C, 0, 0, 0, 0, 4, 0, 1, 0, 0, 2, 2, 0x4C, 0x12, 0, 0x3B]);

    assert!(matches!(GifFile::slurp(&*data), Err(GifError::UnexpectedEndOfData)));

    let mut reader = Reader::new(&*data).unwrap();
    reader.set(EndCode::Optional);
    assert_eq!(reader.next_record().unwrap(), Block::Image);
    reader.read_image_desc().unwrap();
    assert_eq!(reader.read_raster().unwrap(), [1, 1, 1, 1]);
    assert_eq!(reader.next_record().unwrap(), Block::Trailer);
}

#[test]
fn version_follows_content() {
    let mut screen = ScreenDescriptor::new(1, 1);
    screen.global_color_table = Some(ColorTable::new(vec![Color::new(0, 0, 0); 2]).unwrap());
    let mut file = GifFile::new(screen);
    file.push_image(Image::new(ImageDescriptor::new(0, 0, 1, 1), vec![0]).unwrap());
    assert_eq!(file.version(), Version::V87a);
    assert_eq!(&file.spew(Vec::new()).unwrap()[..6], b"GIF87a");

    file.images[0].extensions.push(gifkit::ExtensionBlock::comment("c"));
    assert_eq!(&file.spew(Vec::new()).unwrap()[..6], b"GIF89a");
}

#[test]
fn saves_and_opens_files() {
    let path = std::env::temp_dir().join(format!("gifkit-{}.gif", std::process::id()));
    let file = GifFile::open("tests/samples/sample_2.gif").unwrap();
    file.save(&path).unwrap();
    let back = GifFile::open(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(back, file);
    assert!(matches!(GifFile::open("tests/samples/missing.gif"), Err(GifError::Io(_))));
}
