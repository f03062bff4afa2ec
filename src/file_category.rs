//! Extension-based file categories used to group loose files.
//!
//! Only the extension is consulted; file contents are never read.
//!
//! # Examples
//!
//! ```
//! use foldersense::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.categorize("JPG"), Category::Image);
//! assert_eq!(mapper.categorize("txt"), Category::Document);
//! assert_eq!(mapper.categorize(""), Category::Other);
//! ```

use std::collections::HashMap;

/// A broad file category. Declaration order doubles as the order buckets are
/// reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// PNG, JPG, GIF and friends
    Image,
    /// PDF, DOCX, TXT, ...
    Document,
    /// CSV, XLSX, ODS, ...
    Spreadsheet,
    /// PPTX, ODP, ...
    Presentation,
    Audio,
    Video,
    /// ZIP, RAR, 7Z, ...
    Archive,
    /// Source files
    Code,
    /// Structured data: JSON, XML, SQL dumps
    Data,
    /// Installers and binaries
    Executable,
    Font,
    /// Unmapped or extension-less files
    Other,
}

impl Category {
    /// Canonical folder name for this category.
    ///
    /// ```
    /// use foldersense::file_category::Category;
    ///
    /// assert_eq!(Category::Image.folder_name(), "Images");
    /// assert_eq!(Category::Other.folder_name(), "Miscellaneous_Files");
    /// ```
    pub fn folder_name(&self) -> &'static str {
        match self {
            Category::Image => "Images",
            Category::Document => "Documents",
            Category::Spreadsheet => "Spreadsheets",
            Category::Presentation => "Presentations",
            Category::Audio => "Audio",
            Category::Video => "Videos",
            Category::Archive => "Archives",
            Category::Code => "Code",
            Category::Data => "Data",
            Category::Executable => "Executables",
            Category::Font => "Fonts",
            Category::Other => "Miscellaneous_Files",
        }
    }

    /// Other folder names people commonly use for the same kind of file.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Category::Image => &["Photos", "Pictures", "Pics"],
            Category::Document => &["Docs", "Text_Files", "Notes", "PDFs"],
            Category::Spreadsheet => &["Excel_Files", "Sheets"],
            Category::Presentation => &["Slides", "PowerPoint"],
            Category::Audio => &["Music", "Sounds"],
            Category::Video => &["Movies", "Clips"],
            Category::Archive => &["Compressed", "Zips"],
            Category::Code => &["Source", "Scripts", "src"],
            Category::Data => &["Datasets"],
            Category::Executable => &["Installers", "Programs", "Apps"],
            Category::Font => &[],
            Category::Other => &["Misc", "Miscellaneous", "Other"],
        }
    }

    /// Human-readable description used in rationales.
    pub fn description(&self) -> &'static str {
        match self {
            Category::Image => "image files",
            Category::Document => "documents",
            Category::Spreadsheet => "spreadsheets",
            Category::Presentation => "presentations",
            Category::Audio => "audio files",
            Category::Video => "video files",
            Category::Archive => "archives",
            Category::Code => "source files",
            Category::Data => "data files",
            Category::Executable => "executables",
            Category::Font => "fonts",
            Category::Other => "files of mixed types",
        }
    }
}

/// Maps file extensions to categories.
#[derive(Debug, Clone)]
pub struct FileMapper {
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    /// Creates a mapper with the standard extension table.
    pub fn new() -> Self {
        let mut mapper = Self {
            extension_map: HashMap::new(),
        };
        mapper.populate_standard_mappings();
        mapper
    }

    fn populate_standard_mappings(&mut self) {
        let table: &[(Category, &[&str])] = &[
            (
                Category::Image,
                &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tiff", "ico", "heic", "raw"],
            ),
            (
                Category::Document,
                &["pdf", "txt", "doc", "docx", "rtf", "odt", "md", "tex", "html", "htm", "epub"],
            ),
            (Category::Spreadsheet, &["csv", "xls", "xlsx", "ods", "numbers"]),
            (Category::Presentation, &["ppt", "pptx", "odp", "key"]),
            (Category::Audio, &["mp3", "wav", "ogg", "flac", "aac", "m4a", "wma"]),
            (
                Category::Video,
                &["mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "3gp"],
            ),
            (Category::Archive, &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"]),
            (
                Category::Code,
                &[
                    "py", "java", "c", "cpp", "h", "hpp", "js", "ts", "rs", "go", "sh", "bash",
                    "rb", "php", "css",
                ],
            ),
            (
                Category::Data,
                &["json", "xml", "yaml", "yml", "toml", "sql", "db", "sqlite"],
            ),
            (
                Category::Executable,
                &["exe", "msi", "dmg", "pkg", "deb", "rpm", "apk", "appimage"],
            ),
            (Category::Font, &["ttf", "otf", "woff", "woff2"]),
        ];
        for (category, extensions) in table {
            for ext in *extensions {
                self.add_extension_mapping(ext, *category);
            }
        }
    }

    /// Adds a file extension to category mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map.insert(ext.to_lowercase(), category);
    }

    /// Maps a file extension (without the dot) to a category.
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map.get(&ext.to_lowercase()).copied()
    }

    /// Category for `ext`, falling back to [`Category::Other`].
    pub fn categorize(&self, ext: &str) -> Category {
        if ext.is_empty() {
            return Category::Other;
        }
        self.extension_to_category(ext).unwrap_or(Category::Other)
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_names() {
        assert_eq!(Category::Image.folder_name(), "Images");
        assert_eq!(Category::Document.folder_name(), "Documents");
        assert_eq!(Category::Video.folder_name(), "Videos");
        assert_eq!(Category::Other.folder_name(), "Miscellaneous_Files");
    }

    #[test]
    fn test_extension_to_category() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.extension_to_category("pdf"), Some(Category::Document));
        assert_eq!(mapper.extension_to_category("mp3"), Some(Category::Audio));
        assert_eq!(mapper.extension_to_category("json"), Some(Category::Data));
        assert_eq!(mapper.extension_to_category("xyz"), None);
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.categorize("PNG"), Category::Image);
        assert_eq!(mapper.categorize("Mp3"), Category::Audio);
    }

    #[test]
    fn test_categorize_defaults_to_other() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.categorize(""), Category::Other);
        assert_eq!(mapper.categorize("xyz"), Category::Other);
    }

    #[test]
    fn test_custom_mapping() {
        let mut mapper = FileMapper::default();
        mapper.add_extension_mapping("blend", Category::Data);
        assert_eq!(mapper.categorize("blend"), Category::Data);
    }
}
