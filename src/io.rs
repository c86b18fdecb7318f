use std::io::{
    Read,
    Write,
};
use std::path::Path;

use log::info;
use serde::{
    Deserialize,
    Serialize,
};

use crate::alignment::{
    CliqueTable,
    ConsensusResult,
    CoverageStats,
};
use crate::error::{
    DataError,
    Result,
};
use crate::peaks::{
    Peak,
    PeakId,
    PeakList,
    RetentionTime,
    SampleId,
    Spectrum,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeakRecord {
    pub id: u64,
    pub rt: Vec<f64>,
    pub masses: Vec<f64>,
    pub intensities: Vec<f64>,
}

/// On-disk form of one sample's peak list.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeakListRecord {
    pub sample_id: String,
    pub peaks: Vec<PeakRecord>,
}

impl PeakListRecord {
    pub fn into_peak_list(self) -> std::result::Result<PeakList, DataError> {
        let sample = SampleId(self.sample_id);
        let mut peaks = Vec::with_capacity(self.peaks.len());
        for record in self.peaks {
            let rt = match record.rt.as_slice() {
                [rt1] => RetentionTime::one(*rt1),
                [rt1, rt2] => RetentionTime::two(*rt1, *rt2),
                other => {
                    return Err(DataError::RetentionTimeLength {
                        sample,
                        peak: PeakId(record.id),
                        found: other.len(),
                    })
                },
            };
            peaks.push(Peak::new(
                record.id,
                rt,
                Spectrum::new(record.masses, record.intensities),
            ));
        }
        PeakList::new(sample, peaks)
    }
}

pub fn read_peak_list<R: Read>(reader: R) -> Result<PeakList> {
    let record: PeakListRecord = serde_json::from_reader(reader)?;
    Ok(record.into_peak_list()?)
}

pub fn read_peak_list_json(path: impl AsRef<Path>) -> Result<PeakList> {
    info!("Reading peak list from: {}", path.as_ref().display());
    let file = std::fs::File::open(path)?;
    read_peak_list(std::io::BufReader::new(file))
}

#[derive(Debug, Serialize)]
struct CliqueMemberRow<'a> {
    clique_id: u64,
    sample_id: &'a str,
    peak_id: u64,
    rt1: f64,
    rt2: Option<f64>,
    is_centroid: bool,
}

#[derive(Debug, Serialize)]
struct UnmatchedRow<'a> {
    sample_id: &'a str,
    peak_id: u64,
    rt1: f64,
    rt2: Option<f64>,
}

/// One row per clique member, cliques in creation order.
pub fn write_cliques_csv<W: Write>(
    result: &ConsensusResult,
    writer: W,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let arena = result.arena();
    for clique in result.cliques() {
        let centroid = clique.centroid();
        for member in clique.members() {
            let peak = arena.peak(*member);
            wtr.serialize(CliqueMemberRow {
                clique_id: clique.id().0,
                sample_id: &peak.sample.0,
                peak_id: peak.id.0,
                rt1: peak.rt.rt1(),
                rt2: peak.rt.rt2(),
                is_centroid: centroid == Some(*member),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_unmatched_csv<W: Write>(
    result: &ConsensusResult,
    writer: W,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for key in result.unmatched() {
        let peak = result.arena().peak(*key);
        wtr.serialize(UnmatchedRow {
            sample_id: &peak.sample.0,
            peak_id: peak.id.0,
            rt1: peak.rt.rt1(),
            rt2: peak.rt.rt2(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub sample_ids: Vec<SampleId>,
    pub coverage: &'a CoverageStats,
    pub complete_cliques: usize,
    /// `shared_cliques[a][b]` counts cliques with members of samples a and b.
    pub shared_cliques: Vec<Vec<usize>>,
}

impl<'a> Summary<'a> {
    pub fn new(result: &'a ConsensusResult) -> Self {
        let table = CliqueTable::new(result);
        Summary {
            sample_ids: result.sample_ids(),
            coverage: result.stats(),
            complete_cliques: table.complete_cliques().len(),
            shared_cliques: table.shared_counts(),
        }
    }
}

pub fn write_summary_json<W: Write>(
    result: &ConsensusResult,
    mut writer: W,
) -> Result<()> {
    let summary = Summary::new(result);
    serde_json::to_writer_pretty(&mut writer, &summary)?;
    writer.write_all(b"\n")?;
    Ok(())
}

fn create_file(path: &Path) -> Result<std::io::BufWriter<std::fs::File>> {
    info!("Writing {}", path.display());
    Ok(std::io::BufWriter::new(std::fs::File::create(path)?))
}

pub fn write_cliques_csv_file(
    result: &ConsensusResult,
    path: impl AsRef<Path>,
) -> Result<()> {
    write_cliques_csv(result, create_file(path.as_ref())?)
}

pub fn write_unmatched_csv_file(
    result: &ConsensusResult,
    path: impl AsRef<Path>,
) -> Result<()> {
    write_unmatched_csv(result, create_file(path.as_ref())?)
}

pub fn write_summary_json_file(
    result: &ConsensusResult,
    path: impl AsRef<Path>,
) -> Result<()> {
    write_summary_json(result, create_file(path.as_ref())?)
}
