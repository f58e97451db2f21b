use url::Url;

/// Returns the last path segment of a blob url, e.g. `file.txt` for
/// `https://acct.blob.core.windows.net/container/folder/file.txt`.
///
/// Only the final component is returned, never the virtual directory part.
pub fn extract_blob_name(blob_url: Option<&str>) -> Option<String> {
    let segments = path_segments(blob_url)?;

    if segments.len() > 2 {
        segments.last().cloned()
    } else {
        None
    }
}

/// Returns the parent segment of the blob, with its trailing `/` removed.
///
/// For `https://acct.blob.core.windows.net/container/folder/file.txt` this is
/// `folder`, not `container`.
pub fn extract_container_name(blob_url: Option<&str>) -> Option<String> {
    let segments = path_segments(blob_url)?;

    if segments.len() > 1 {
        let parent = &segments[segments.len() - 2];
        Some(parent.trim_end_matches('/').to_string())
    } else {
        None
    }
}

// URI segments keep their trailing delimiter: `/a/b/c` -> ["/", "a/", "b/", "c"].
fn path_segments(blob_url: Option<&str>) -> Option<Vec<String>> {
    let blob_url = blob_url.filter(|u| !u.is_empty())?;
    let url = Url::parse(blob_url).ok()?;

    Some(
        url.path()
            .split_inclusive('/')
            .map(str::to_string)
            .collect(),
    )
}
