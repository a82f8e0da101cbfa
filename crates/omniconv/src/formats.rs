//! Static file-kind tables: extension to category mapping and the
//! dangerous-extension set.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Presentation,
    Spreadsheet,
    Archive,
    Font,
    Unknown,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Video => "video",
            FileCategory::Audio => "audio",
            FileCategory::Document => "document",
            FileCategory::Presentation => "presentation",
            FileCategory::Spreadsheet => "spreadsheet",
            FileCategory::Archive => "archive",
            FileCategory::Font => "font",
            FileCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "svg", "jfif", "ico", "psd", "raw",
    "cr2", "nef", "dng", "heic", "heif", "avif", "pbm", "pgm", "ppm", "xbm", "xpm", "tga", "pcx",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "wmv", "flv", "webm", "mkv", "3gp", "m4v", "f4v", "asf", "rm", "rmvb",
    "vob", "ts", "mts", "m2ts", "divx", "xvid", "ogv", "dv", "mxf",
];

pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "wma", "m4a", "mid", "midi", "ra", "amr", "opus", "ape",
    "ac3", "dts", "aiff", "au", "snd", "gsm", "voc",
];

pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "rtf", "odt", "pages", "epub", "mobi", "azw", "azw3", "fb2",
    "djvu", "ps", "eps", "tex", "md", "html", "htm",
];

pub const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx", "odp", "key"];

pub const SPREADSHEET_EXTENSIONS: &[&str] = &[
    "xlsx", "xls", "csv", "ods", "tsv", "dbf", "xlsm", "xlsb", "numbers",
];

pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2", "xz", "z", "lzma"];

pub const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "woff", "woff2", "eot"];

/// Executables, shell/server scripts and installers that are never accepted,
/// whatever the declared category.
pub const DANGEROUS_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "pif", "scr", "vbs", "js", "jar", "msi", "dll", "sys", "sh",
    "bash", "php", "jsp", "asp", "aspx",
];

const CATEGORY_TABLE: &[(FileCategory, &[&str])] = &[
    (FileCategory::Image, IMAGE_EXTENSIONS),
    (FileCategory::Video, VIDEO_EXTENSIONS),
    (FileCategory::Audio, AUDIO_EXTENSIONS),
    (FileCategory::Document, DOCUMENT_EXTENSIONS),
    (FileCategory::Presentation, PRESENTATION_EXTENSIONS),
    (FileCategory::Spreadsheet, SPREADSHEET_EXTENSIONS),
    (FileCategory::Archive, ARCHIVE_EXTENSIONS),
    (FileCategory::Font, FONT_EXTENSIONS),
];

/// Maps a file extension (without dot, any case) to its category.
pub fn category_for_extension(ext: &str) -> Option<FileCategory> {
    let ext = ext.to_ascii_lowercase();
    CATEGORY_TABLE.iter().find_map(|(category, extensions)| {
        if extensions.contains(&ext.as_str()) {
            Some(*category)
        } else {
            None
        }
    })
}

pub fn extensions_for_category(category: FileCategory) -> &'static [&'static str] {
    CATEGORY_TABLE
        .iter()
        .find_map(|(c, extensions)| if *c == category { Some(*extensions) } else { None })
        .unwrap_or(&[])
}

pub fn is_dangerous_extension(ext: &str) -> bool {
    DANGEROUS_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// All categories that carry at least one extension, in table order.
pub fn known_categories() -> impl Iterator<Item = FileCategory> {
    CATEGORY_TABLE.iter().map(|(category, _)| *category)
}
