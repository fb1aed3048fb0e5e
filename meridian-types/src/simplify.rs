use crate::cartesian::Point2;
use crate::segment::Segment;

/// Simplifies a polyline with the Douglas-Peucker algorithm.
///
/// Points closer than `sqrt(squared_tolerance)` to the simplified line are dropped. The first and the last points
/// are always kept.
pub fn douglas_peucker(points: &[Point2], squared_tolerance: f64) -> Vec<Point2> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0, n - 1)];
    while let Some((first, last)) = stack.pop() {
        let segment = Segment(&points[first], &points[last]);
        let mut max_sq = 0.0;
        let mut index = first;
        for (i, point) in points.iter().enumerate().take(last).skip(first + 1) {
            let distance = segment.distance_to_point_sq(point);
            if distance > max_sq {
                index = i;
                max_sq = distance;
            }
        }

        if max_sq > squared_tolerance {
            keep[index] = true;
            if index - first > 1 {
                stack.push((first, index));
            }
            if last - index > 1 {
                stack.push((index, last));
            }
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, keep)| keep.then_some(*p))
        .collect()
}
