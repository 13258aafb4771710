//! Partitioning of spatial positions into groups from a label input, used by GROUP unpooling.
use indexmap::IndexSet;
use log::trace;
use ndarray::{ArrayViewD, Axis};
use std::ops::Range;
use unpool_core::{errors::ConfigError, shape::GridShape};

/// For each batch element and group-channel, the groups of spatial positions that share a label.
///
/// Labels are remapped to dense ids `0..K` in order of first appearance in a row-major scan. Groups are stored
/// flat: `members` holds every position of every group back to back (row-major within a group) and `offsets`
/// delimits the groups, so a pass walks contiguous memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupPartition {
	batch: usize,
	group_channels: usize,
	spatial: usize,

	/// Dense group id of every position, laid out (N, G, H*W).
	ids: Vec<usize>,

	/// For each (n, gc), the range of global group numbers belonging to it.
	partitions: Vec<Range<usize>>,

	/// Global group `j` is `members[offsets[j]..offsets[j + 1]]`.
	offsets: Vec<usize>,
	members: Vec<usize>,
}

impl GroupPartition {
	/// Build the partition from a label array of shape (N, G, H, W).
	///
	/// Labels are truncated to integers before comparison, so `2.0` and `2.7` share a group.
	///
	/// # Errors
	/// Returns an error if `labels` is not four dimensional, has a batch size or spatial size that differs from
	/// `source`, or contains a non-finite value.
	pub fn build(labels: ArrayViewD<f32>, source: &GridShape) -> Result<Self, ConfigError> {
		let label_shape = GridShape::from_slice(labels.shape())
			.map_err(|_| ConfigError::from(format!("group labels must have shape (N, G, H, W), found {:?}", labels.shape())))?;
		if label_shape.batch != source.batch {
			return Err(format!(
				"group labels batch size ({}) does not match input batch size ({})",
				label_shape.batch, source.batch
			)
			.into());
		}
		if label_shape.height != source.height || label_shape.width != source.width {
			return Err(format!(
				"group labels spatial size ({}x{}) does not match input spatial size ({}x{})",
				label_shape.height, label_shape.width, source.height, source.width
			)
			.into());
		}

		let spatial = label_shape.spatial();
		let mut partition = GroupPartition {
			batch: label_shape.batch,
			group_channels: label_shape.channels,
			spatial,
			ids: Vec::with_capacity(label_shape.flat_size()),
			partitions: Vec::with_capacity(label_shape.planes()),
			offsets: vec![0],
			members: Vec::with_capacity(label_shape.flat_size()),
		};

		let mut dense: IndexSet<i64> = IndexSet::new();
		let mut cursor: Vec<usize> = Vec::new();
		for (n, batch_labels) in labels.axis_iter(Axis(0)).enumerate() {
			for (gc, plane) in batch_labels.axis_iter(Axis(0)).enumerate() {
				dense.clear();
				let ids_start = partition.ids.len();
				for (position, &value) in plane.iter().enumerate() {
					if !value.is_finite() {
						return Err(ConfigError::InvalidGroupLabel {
							value,
							batch: n,
							group_channel: gc,
							position,
						});
					}
					let (id, _) = dense.insert_full(value as i64);
					partition.ids.push(id);
				}
				let plane_ids = &partition.ids[ids_start..];

				// counting sort of positions by group id, stable so members stay row-major
				let first = partition.offsets.len() - 1;
				let num_groups = dense.len();
				let mut counts = vec![0usize; num_groups];
				for &id in plane_ids {
					counts[id] += 1;
				}
				cursor.clear();
				let mut end = partition.members.len();
				for count in counts {
					cursor.push(end);
					end += count;
					partition.offsets.push(end);
				}
				partition.members.resize(end, 0);
				for (position, &id) in plane_ids.iter().enumerate() {
					partition.members[cursor[id]] = position;
					cursor[id] += 1;
				}
				partition.partitions.push(first..first + num_groups);

				trace!("group partition batch {} group channel {}: {} groups", n, gc, num_groups);
			}
		}

		Ok(partition)
	}

	pub fn batch(&self) -> usize {
		self.batch
	}

	pub fn group_channels(&self) -> usize {
		self.group_channels
	}

	/// Number of positions per plane.
	pub fn spatial(&self) -> usize {
		self.spatial
	}

	pub fn num_groups(&self, n: usize, gc: usize) -> usize {
		self.partitions[n * self.group_channels + gc].len()
	}

	/// Dense group id of every position of the (n, gc) plane.
	pub fn ids(&self, n: usize, gc: usize) -> &[usize] {
		let start = (n * self.group_channels + gc) * self.spatial;
		&self.ids[start..start + self.spatial]
	}

	/// Positions of group `id` of the (n, gc) plane, in row-major order.
	pub fn members(&self, n: usize, gc: usize, id: usize) -> &[usize] {
		let j = self.partitions[n * self.group_channels + gc].start + id;
		&self.members[self.offsets[j]..self.offsets[j + 1]]
	}

	/// Every group of the (n, gc) plane in id order.
	pub fn groups(&self, n: usize, gc: usize) -> impl ExactSizeIterator<Item = &[usize]> + '_ {
		self.partitions[n * self.group_channels + gc]
			.clone()
			.map(move |j| &self.members[self.offsets[j]..self.offsets[j + 1]])
	}
}
