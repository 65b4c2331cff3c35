//! Prompt assembly for the text-generation service.

use saga_analyzer::Analysis;
use std::path::Path;

/// Source beyond this many bytes is cut before being sent.
const MAX_CONTENT_LENGTH: usize = 10_000;

/// Build the per-file documentation prompt: a small structural summary
/// followed by the (possibly truncated) source.
pub fn documentation_prompt(path: &Path, content: &str, analysis: &Analysis) -> String {
    let mut source = content;
    let mut truncated = false;
    if source.len() > MAX_CONTENT_LENGTH {
        let mut cut = MAX_CONTENT_LENGTH;
        while !source.is_char_boundary(cut) {
            cut -= 1;
        }
        source = &source[..cut];
        truncated = true;
    }
    let suffix = if truncated { "\n... (truncated)" } else { "" };

    format!(
        "Please generate comprehensive documentation for the following Python file.

File Path: {path}
File Type: {ext}

Code Analysis:
- Classes: {classes}
- Functions: {functions}
- Imports: {imports}
- Lines of Code: {loc}

File Content:
```python
{source}{suffix}
```

Please provide:
1. A brief overview of the file's purpose
2. Detailed description of each class (purpose, key methods, relationships)
3. Detailed description of each function (purpose, parameters, return values, exceptions)
4. Key dependencies and imports
5. Usage examples where applicable
6. Any important notes or considerations

Format the documentation in clean Markdown with appropriate headers and sections.",
        path = path.display(),
        ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
        classes = analysis.classes.len(),
        functions = analysis.functions.len(),
        imports = analysis.imports.len(),
        loc = analysis.loc,
    )
}
