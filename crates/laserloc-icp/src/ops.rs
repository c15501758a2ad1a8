use kiddo::immutable::float::kdtree::ImmutableKdTree;
use laserloc_3d::transforms::RigidTransform;

/// Nearest neighbour index over the planar coordinates of a point cloud.
pub(crate) type PlanarKdTree = ImmutableKdTree<f64, u32, 2, 32>;

/// Build the nearest neighbour index of a point cloud, ignoring `z`.
pub(crate) fn build_kdtree(points: &[[f64; 3]]) -> PlanarKdTree {
    let planar = points.iter().map(|p| [p[0], p[1]]).collect::<Vec<_>>();
    ImmutableKdTree::new_from_slice(&planar)
}

/// Point pairs matched by nearest neighbour search.
#[derive(Debug, Default)]
pub(crate) struct Correspondences {
    pub points_in_src: Vec<[f64; 3]>,
    pub points_in_dst: Vec<[f64; 3]>,
    pub squared_distances: Vec<f64>,
}

impl Correspondences {
    pub fn len(&self) -> usize {
        self.points_in_src.len()
    }

    /// Mean squared distance between matched points.
    pub fn mean_squared_error(&self) -> f64 {
        if self.squared_distances.is_empty() {
            return f64::INFINITY;
        }
        self.squared_distances.iter().sum::<f64>() / self.squared_distances.len() as f64
    }
}

/// Match every source point with its nearest target point within `max_distance`.
pub(crate) fn find_correspondences(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    kdtree: &PlanarKdTree,
    max_distance: f64,
) -> Correspondences {
    let max_sq_distance = max_distance * max_distance;
    let mut res = Correspondences::default();

    for p in source.iter() {
        let nn = kdtree.nearest_one::<kiddo::SquaredEuclidean>(&[p[0], p[1]]);
        if nn.distance > max_sq_distance {
            continue;
        }
        res.points_in_src.push(*p);
        res.points_in_dst.push(target[nn.item as usize]);
        res.squared_distances.push(nn.distance);
    }

    res
}

/// Compute the planar rigid transformation between two sets of matched points.
///
/// Finds the rotation around `z` and the translation minimizing the sum of
/// squared distances between `dst_r_src * src + dst_t_src` and `dst`, in
/// closed form: the optimal angle is `atan2(sum(s x d), sum(s . d))` over the
/// centered point pairs.
///
/// # Arguments
///
/// * `points_in_src` - Source points.
/// * `points_in_dst` - Destination points, same length as `points_in_src`.
///
/// # Returns
///
/// The transformation mapping source points onto destination points.
pub fn fit_transformation(points_in_src: &[[f64; 3]], points_in_dst: &[[f64; 3]]) -> RigidTransform {
    assert_eq!(points_in_src.len(), points_in_dst.len());

    // Identity transformation is a special case
    if points_in_src == points_in_dst || points_in_src.is_empty() {
        return RigidTransform::IDENTITY;
    }

    let (src_centroid, dst_centroid) = compute_centroids(points_in_src, points_in_dst);

    // cross and dot products of the centered pairs
    let mut cross = 0.0;
    let mut dot = 0.0;
    for (s, d) in points_in_src.iter().zip(points_in_dst.iter()) {
        let sx = s[0] - src_centroid[0];
        let sy = s[1] - src_centroid[1];
        let dx = d[0] - dst_centroid[0];
        let dy = d[1] - dst_centroid[1];
        cross += sx * dy - sy * dx;
        dot += sx * dx + sy * dy;
    }

    let yaw = cross.atan2(dot);
    let (s, c) = yaw.sin_cos();

    // t = dst_mean - R * src_mean
    let tx = dst_centroid[0] - (c * src_centroid[0] - s * src_centroid[1]);
    let ty = dst_centroid[1] - (s * src_centroid[0] + c * src_centroid[1]);
    let tz = dst_centroid[2] - src_centroid[2];

    let mut transform = RigidTransform::from_planar(tx, ty, yaw);
    transform.translation[2] = tz;
    transform
}

/// Compute the centroids of two sets of points.
pub(crate) fn compute_centroids(points1: &[[f64; 3]], points2: &[[f64; 3]]) -> ([f64; 3], [f64; 3]) {
    let mean = |points: &[[f64; 3]]| {
        let n = points.len().max(1) as f64;
        let sum = points.iter().fold([0.0; 3], |acc, p| {
            [acc[0] + p[0], acc[1] + p[1], acc[2] + p[2]]
        });
        [sum[0] / n, sum[1] / n, sum[2] / n]
    };
    (mean(points1), mean(points2))
}

/// Score how well `source` overlays the indexed target.
///
/// Returns the mean squared nearest neighbour distance over the source points
/// whose neighbour lies within `inlier_distance`, together with the number of
/// such inliers. Points without a close neighbour do not add to the score. With
/// no inliers the score is `f64::MAX`.
pub fn compute_fitness(source: &[[f64; 3]], target: &[[f64; 3]], inlier_distance: f64) -> (f64, usize) {
    if target.is_empty() {
        return (f64::MAX, 0);
    }
    let kdtree = build_kdtree(target);
    fitness_with_kdtree(source, &kdtree, inlier_distance)
}

pub(crate) fn fitness_with_kdtree(
    source: &[[f64; 3]],
    kdtree: &PlanarKdTree,
    inlier_distance: f64,
) -> (f64, usize) {
    let max_sq_distance = inlier_distance * inlier_distance;
    let (sum, num_inliers) = source
        .iter()
        .map(|p| kdtree.nearest_one::<kiddo::SquaredEuclidean>(&[p[0], p[1]]).distance)
        .filter(|d| *d <= max_sq_distance)
        .fold((0.0, 0usize), |(sum, n), d| (sum + d, n + 1));

    if num_inliers == 0 {
        return (f64::MAX, 0);
    }
    (sum / num_inliers as f64, num_inliers)
}
