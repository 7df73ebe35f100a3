use std::collections::HashMap;
use std::convert::TryFrom;
use unic_ucd_category::GeneralCategory;

pub fn tokens_iter(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c| !is_token_charcter(c))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

pub fn is_token_charcter(c: char) -> bool {
    let category = GeneralCategory::of(c);
    category.is_number() || category.is_letter() || category == GeneralCategory::PrivateUse
}

const FTS_FREQUENCY_POSTFIX: &[u8] = b"_frequency";
const FTS_TOKENS_POSTFIX: &[u8] = b"_tokens";
const FTS_DOCLEN_POSTIFX: &[u8] = b"_doclen";
const TOTAL_KEY: &[u8] = &[];

// BM25 parameters
const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Full text index over three trees:
///
/// * `tokens`: token -> (number of documents containing it: u32, token id: u64).
///   The empty token counts every document.
/// * `frequency`: token id ++ document key -> occurrences in that document.
/// * `doclen`: document key -> token count; the empty key holds the sum.
pub struct FTSTree {
    frequency: sled::Tree,
    tokens: sled::Tree,
    doclen: sled::Tree,
}

pub trait FTSExt {
    fn open_fts<V: AsRef<[u8]>>(&self, name: V) -> sled::Result<FTSTree>;
}

impl FTSExt for sled::Db {
    fn open_fts<V: AsRef<[u8]>>(&self, name: V) -> sled::Result<FTSTree> {
        let name_ref = name.as_ref();

        let mut frequency_name = name_ref.to_vec();
        frequency_name.extend_from_slice(FTS_FREQUENCY_POSTFIX);
        let frequency = self.open_tree(frequency_name)?;

        let mut tokens_name = name_ref.to_vec();
        tokens_name.extend_from_slice(FTS_TOKENS_POSTFIX);
        let tokens = self.open_tree(tokens_name)?;

        let mut doclen_name = name_ref.to_vec();
        doclen_name.extend_from_slice(FTS_DOCLEN_POSTIFX);
        let doclen = self.open_tree(doclen_name)?;

        Ok(FTSTree {
            frequency,
            tokens,
            doclen,
        })
    }
}

fn corrupt() -> sled::Error {
    sled::Error::Unsupported("corrupt full text index entry".to_owned())
}

fn mismatch() -> sled::Error {
    sled::Error::Unsupported("value does not match inserted document".to_owned())
}

fn read_u32(data: &[u8]) -> sled::Result<u32> {
    Ok(u32::from_le_bytes(
        TryFrom::try_from(data).map_err(|_| corrupt())?,
    ))
}

/// Splits a `tokens` entry into (document count, token id bytes).
fn read_token_entry(data: &[u8]) -> sled::Result<(u32, [u8; 8])> {
    if data.len() != 12 {
        return Err(corrupt());
    }
    let count = read_u32(&data[0..4])?;
    let id = TryFrom::try_from(&data[4..12]).map_err(|_| corrupt())?;
    Ok((count, id))
}

fn token_entry(count: u32, id: &[u8]) -> Vec<u8> {
    let mut entry = count.to_le_bytes().to_vec();
    entry.extend_from_slice(id);
    entry
}

fn count_tokens(value: &str) -> (HashMap<String, u32>, u32) {
    let mut token_counts: HashMap<String, u32> = HashMap::new();
    let mut total_count = 0u32;
    for token in tokens_iter(value) {
        *token_counts.entry(token).or_insert(0) += 1;
        total_count += 1;
    }
    token_counts.insert(String::new(), 1);
    (token_counts, total_count)
}

fn flatten(e: sled::transaction::TransactionError<()>) -> sled::Error {
    match e {
        sled::transaction::TransactionError::Storage(s) => s,
        sled::transaction::TransactionError::Abort(()) => mismatch(),
    }
}

impl FTSTree {
    /// Indexes `value` under `key`. Keys must be non-empty and not yet indexed.
    pub fn insert<K: AsRef<[u8]>>(&self, key: K, value: &str) -> sled::Result<()> {
        use sled::Transactional;
        let key = key.as_ref();
        if key.is_empty() {
            return Err(sled::Error::Unsupported(
                "empty document keys are reserved".to_owned(),
            ));
        }
        let (token_counts, total_count) = count_tokens(value);
        (&self.frequency, &self.tokens, &self.doclen)
            .transaction(|(frequency, tokens, doclen)| {
                if doclen
                    .insert(key, total_count.to_le_bytes().as_ref())?
                    .is_some()
                {
                    return Err(sled::Error::Unsupported(
                        "document is already indexed".to_owned(),
                    )
                    .into());
                }
                let old_total_dl = match doclen.get(TOTAL_KEY)? {
                    Some(dl) => read_u32(&dl)?,
                    None => 0,
                };
                doclen.insert(TOTAL_KEY, (old_total_dl + total_count).to_le_bytes().as_ref())?;
                for (token, count) in token_counts.iter() {
                    let (old_docs, id) = match tokens.get(token.as_bytes())? {
                        Some(old) => read_token_entry(&old)?,
                        None => (0, tokens.generate_id()?.to_le_bytes()),
                    };
                    let mut frequency_key = id.to_vec();
                    frequency_key.extend_from_slice(key);
                    frequency.insert(frequency_key, count.to_le_bytes().as_ref())?;
                    tokens.insert(token.as_bytes(), token_entry(old_docs + 1, &id))?;
                }
                Ok(())
            })
            .map_err(flatten)
    }

    /// Removes a document. `value` must be the text it was indexed with.
    pub fn remove<K: AsRef<[u8]>>(&self, key: K, value: &str) -> sled::Result<()> {
        use sled::Transactional;
        let key = key.as_ref();
        let (token_counts, total_count) = count_tokens(value);
        (&self.frequency, &self.tokens, &self.doclen)
            .transaction(|(frequency, tokens, doclen)| {
                let old_total_count = doclen
                    .remove(key)?
                    .ok_or(sled::transaction::ConflictableTransactionError::Abort(()))?;
                if old_total_count.as_ref() != total_count.to_le_bytes().as_ref() {
                    return Err(mismatch().into());
                }
                let old_total_dl = match doclen.get(TOTAL_KEY)? {
                    Some(dl) => read_u32(&dl)?,
                    None => 0,
                };
                doclen.insert(TOTAL_KEY, (old_total_dl - total_count).to_le_bytes().as_ref())?;
                for (token, count) in token_counts.iter() {
                    let (old_docs, id) = match tokens.get(token.as_bytes())? {
                        Some(old) => read_token_entry(&old)?,
                        None => return Err(mismatch().into()),
                    };
                    let mut frequency_key = id.to_vec();
                    frequency_key.extend_from_slice(key);
                    let old_frequency = frequency.remove(frequency_key)?.ok_or_else(mismatch)?;
                    if old_frequency.as_ref() != count.to_le_bytes().as_ref() {
                        return Err(mismatch().into());
                    }
                    tokens.insert(token.as_bytes(), token_entry(old_docs - 1, &id))?;
                }
                Ok(())
            })
            .map_err(flatten)
    }

    /// BM25 scores for every document matching at least one query token.
    /// With `prefix_last` the final token also matches any indexed token
    /// starting with it.
    pub fn query(&self, value: &str, prefix_last: bool) -> sled::Result<HashMap<sled::IVec, f32>> {
        let query_tokens = tokens_iter(value).collect::<Vec<_>>();
        let mut token_counts: HashMap<Vec<u8>, u32> = HashMap::new();
        for token in &query_tokens {
            *token_counts.entry(token.as_bytes().to_vec()).or_insert(0) += 1;
        }
        if prefix_last {
            if let Some(last) = query_tokens.last() {
                for entry in self.tokens.scan_prefix(last.as_bytes()).keys() {
                    token_counts.entry(entry?.to_vec()).or_insert(1);
                }
            }
        }

        let mut ret = HashMap::new();

        let num_documents = match self.tokens.get("")? {
            Some(data) => read_token_entry(&data)?.0,
            None => 0,
        };
        if num_documents == 0 {
            return Ok(ret);
        }
        let total_dl = match self.doclen.get(TOTAL_KEY)? {
            Some(dl) => read_u32(&dl)?,
            None => 0,
        };
        let avgdl = total_dl as f32 / num_documents as f32;

        for (token, count) in token_counts {
            let (docs, id) = match self.tokens.get(&token)? {
                Some(token_data) => read_token_entry(&token_data)?,
                None => continue,
            };
            let idf = ((num_documents as f32 - docs as f32 + 0.5) / (docs as f32 + 0.5) + 1.0).ln();
            for frequency_data_result in self.frequency.scan_prefix(id) {
                let (id_and_key, frequency_data) = frequency_data_result?;
                let frequency = read_u32(&frequency_data)? as f32;
                let key = sled::IVec::from(&id_and_key[8..]);
                let dl = match self.doclen.get(&key)? {
                    Some(dl) => read_u32(&dl)?,
                    None => return Err(corrupt()),
                };
                let bm25 = idf * frequency * (K1 + 1.0)
                    / (frequency + K1 * (1.0 - B + B * dl as f32 / avgdl));
                *ret.entry(key).or_insert(0.0) += bm25 * count as f32;
            }
        }

        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(res: &HashMap<sled::IVec, f32>, key: &[u8]) -> Option<f32> {
        res.get(&sled::IVec::from(key)).copied()
    }

    #[test]
    fn query() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let fts_tree = db.open_fts("test").unwrap();
        fts_tree.insert(b"k1", "foo bar").unwrap();
        fts_tree.insert(b"k2", "foo").unwrap();
        fts_tree.insert(b"k3", "bar").unwrap();
        let res = fts_tree.query("foo", false).unwrap();
        assert!(score(&res, b"k2").unwrap() > score(&res, b"k1").unwrap());
        assert_eq!(score(&res, b"k3"), None);
        let res = fts_tree.query("foo bar", false).unwrap();
        assert!(score(&res, b"k1").unwrap() > score(&res, b"k2").unwrap());
        assert_eq!(score(&res, b"k2"), score(&res, b"k3"));
    }

    #[test]
    fn case_insensitive_and_prefix() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let fts_tree = db.open_fts("test").unwrap();
        fts_tree.insert(b"k1", "Interstellar").unwrap();
        fts_tree.insert(b"k2", "Pulp Fiction").unwrap();
        let res = fts_tree.query("PULP", false).unwrap();
        assert!(score(&res, b"k2").is_some());
        assert!(fts_tree.query("inter", false).unwrap().is_empty());
        let res = fts_tree.query("inter", true).unwrap();
        assert!(score(&res, b"k1").is_some());
        assert_eq!(score(&res, b"k2"), None);
    }

    #[test]
    fn delete() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let fts_tree = db.open_fts("test").unwrap();
        fts_tree.insert(b"k1", "foo bar").unwrap();
        fts_tree.insert(b"k2", "foo").unwrap();
        let before = fts_tree.query("foo bar", false).unwrap();
        fts_tree.insert(b"k3", "bar").unwrap();
        fts_tree.remove(b"k3", "bar").unwrap();
        let after = fts_tree.query("foo bar", false).unwrap();
        assert_eq!(before.len(), after.len());
        for (key, value) in before {
            assert!((after[&key] - value).abs() < 1e-6);
        }
        assert!(fts_tree.remove(b"k3", "bar").is_err());
        assert!(fts_tree.remove(b"k2", "something else").is_err());
    }

    #[test]
    fn rejects_duplicates_and_empty_keys() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let fts_tree = db.open_fts("test").unwrap();
        fts_tree.insert(b"k1", "foo").unwrap();
        assert!(fts_tree.insert(b"k1", "foo").is_err());
        assert!(fts_tree.insert(b"", "foo").is_err());
        assert!(fts_tree.query("", true).unwrap().is_empty());
    }
}
