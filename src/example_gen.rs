/*!
Seeded generators for synthetic allele sets, used by tests and benchmarks.
*/

use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::AlleleomeResult;
use crate::sequence::{Sequence, SequenceKind, SequenceSet};

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
const STOP_CODONS: [&[u8; 3]; 3] = [b"TAA", b"TAG", b"TGA"];

/// Creates a gene whose alleles are mutated copies of one random ORF.
/// Every allele starts with ATG, ends with TAA, and has no internal stop codons under the standard or bacterial code.
/// Indels are whole codons, so every allele stays in frame.
/// # Arguments
/// * `gene_id` - identifier of the generated gene
/// * `num_codons` - number of sense codons between the start and the stop codon
/// * `num_genomes` - number of alleles to generate, genome ids are `genome0`, `genome1`, ...
/// * `mutation_rate` - per-codon chance of a single-base substitution
/// * `indel_rate` - per-codon chance of a codon insertion or deletion, equally likely
/// * `seed` - seed of the random generator
/// # Errors
/// * if the set cannot be built, see [`SequenceSet::new`]
pub fn generate_gene(
    gene_id: &str, num_codons: usize, num_genomes: usize, mutation_rate: f64, indel_rate: f64, seed: u64
) -> AlleleomeResult<SequenceSet> {
    assert!((0.0..=1.0).contains(&mutation_rate));
    assert!((0.0..=1.0).contains(&indel_rate));

    let mut rng = StdRng::seed_from_u64(seed);
    let event_distribution = Uniform::new(0.0, 1.0);
    let offset_distribution = Uniform::new(0, 3);

    let reference: Vec<[u8; 3]> = (0..num_codons)
        .map(|_i| random_sense_codon(&mut rng))
        .collect();

    let sequences = (0..num_genomes)
        .map(|genome| {
            let mut residues = b"ATG".to_vec();
            for codon in reference.iter() {
                if rng.sample(event_distribution) < indel_rate {
                    if rng.gen_bool(0.5) {
                        // deletion
                        continue;
                    }
                    // insertion
                    residues.extend_from_slice(&random_sense_codon(&mut rng));
                }

                let mut codon = *codon;
                if rng.sample(event_distribution) < mutation_rate {
                    let offset = rng.sample(offset_distribution);
                    loop {
                        let mut mutated = codon;
                        mutated[offset] = BASES[rng.gen_range(0..BASES.len())];
                        if mutated != codon && !is_stop(&mutated) {
                            codon = mutated;
                            break;
                        }
                    }
                }
                residues.extend_from_slice(&codon);
            }
            residues.extend_from_slice(b"TAA");
            Sequence::new(format!("genome{genome}"), &residues)
        })
        .collect();

    SequenceSet::new(gene_id, SequenceKind::Nucleotide, sequences)
}

fn is_stop(codon: &[u8; 3]) -> bool {
    STOP_CODONS.iter().any(|stop| *stop == codon)
}

fn random_sense_codon(rng: &mut StdRng) -> [u8; 3] {
    loop {
        let codon = [
            BASES[rng.gen_range(0..BASES.len())],
            BASES[rng.gen_range(0..BASES.len())],
            BASES[rng.gen_range(0..BASES.len())]
        ];
        if !is_stop(&codon) {
            return codon;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::genetic_code::{Codon, GeneticCode, GeneticCodeId};

    #[test]
    fn test_alleles_are_orfs() {
        let code = GeneticCode::load(GeneticCodeId::Bacterial).unwrap();
        let set = generate_gene("geneA", 50, 20, 0.05, 0.02, 7).unwrap();
        assert_eq!(set.len(), 20);
        assert_eq!(set.sequences()[3].genome_id().as_ref(), "genome3");
        for sequence in set.sequences().iter() {
            assert_eq!(sequence.len() % 3, 0);
            let codons: Vec<Codon> = sequence.residues().chunks_exact(3)
                .map(|c| Codon::new(c).unwrap())
                .collect();
            let last = codons.len() - 1;
            assert!(code.is_start(&codons[0]));
            assert!(code.is_stop(&codons[last]));
            assert!(codons[..last].iter().all(|c| !code.is_stop(c)));
        }
    }

    #[test]
    fn test_no_errors() {
        let set = generate_gene("geneA", 30, 5, 0.0, 0.0, 0).unwrap();
        let first = set.sequences()[0].residues();
        assert_eq!(first.len(), 96);
        assert!(set.sequences().iter().all(|s| s.residues() == first));
    }

    #[test]
    fn test_seeded() {
        let a = generate_gene("geneA", 40, 4, 0.1, 0.05, 42).unwrap();
        let b = generate_gene("geneA", 40, 4, 0.1, 0.05, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_genomes() {
        assert!(generate_gene("geneA", 10, 0, 0.0, 0.0, 0).unwrap().is_empty());
    }
}
