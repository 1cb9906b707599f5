/// `parallelize_op!` macro for repeating an operation across
/// the lanes of an array, collecting one result per lane.
///
/// - `parallelize_op!(array, Axis(n), pool, op)`
///
///     Splits `array` into its lanes along `Axis(n)` and calls
///     `op(index, lane)` on each inside the rayon thread pool `pool`.
///     `op` must return `Result<T, QuantError>`. The macro evaluates to
///     `Result<Vec<T>, QuantError>` with the results in lane order,
///     whatever order the workers finish in; the first error is returned.
///
///     <br>
///
/// - `parallelize_op!(array, Axis(n), op)`
///
///     The same on the calling thread, one lane after another.
///     Produces identical results to the pooled form as long as `op`
///     depends only on its arguments.
macro_rules! parallelize_op {
    (   $array : expr,
        Axis($axis : literal),
        $pool : expr,
        $op : expr
    ) => {
        {
            use ::rayon::prelude::*;
            // Lanes are views, so collecting them copies no data
            let lanes : Vec<_> = $array.axis_iter(::ndarray::Axis($axis)).collect();
            $pool.install(|| {
                lanes.into_par_iter()
                    .enumerate()
                    .map(|(index, lane)| $op(index, lane))
                    .collect::<Result<Vec<_>, $crate::utils::QuantError>>()
            })
        }
    };

    (   $array : expr,
        Axis($axis : literal),
        $op : expr
    ) => {
        $array.axis_iter(::ndarray::Axis($axis))
            .enumerate()
            .map(|(index, lane)| $op(index, lane))
            .collect::<Result<Vec<_>, $crate::utils::QuantError>>()
    };
}

pub (crate) use parallelize_op;
